use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
/// Everything has a sane default: the app is single-user and local, so
/// it must start with no environment at all.
#[derive(Debug, Clone)]
pub struct Config {
    // AI provider
    pub ai_provider: String,
    pub ai_model: String,
    pub ai_base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub ai_timeout: Duration,
    pub ai_fallback_enabled: bool,

    // Enrichment
    pub geocode_base_url: String,
    pub routing_base_url: String,
    pub enrichment_timeout: Duration,

    // Scraping
    pub scrape_timeout: Duration,

    // KPI normalization
    pub region_avg_price_m2: u64,

    // Validation thresholds
    pub limits: ValidationLimits,
    pub kpi: KpiThresholds,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Storage
    pub database_url: String,
    pub data_dir: String,
}

/// Plausible ranges for parsed numeric fields. Out-of-range values are
/// capped to the boundary, never rejected.
#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    pub build_year_min: u16,
    pub build_year_max: u16,
    pub living_area_min_m2: f64,
    pub living_area_max_m2: f64,
    pub max_rooms: u8,
    pub max_bedrooms: u8,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            build_year_min: 1500,
            build_year_max: 2030,
            living_area_min_m2: 10.0,
            living_area_max_m2: 2000.0,
            max_rooms: 25,
            max_bedrooms: 15,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KpiThresholds {
    pub family_min_area_m2: f64,
    pub family_min_bedrooms: u8,
}

impl Default for KpiThresholds {
    fn default() -> Self {
        Self {
            family_min_area_m2: 100.0,
            family_min_bedrooms: 3,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let data_dir = env_or("DATA_DIR", "./data");
        Self {
            ai_provider: env_or("AI_PROVIDER", "none"),
            ai_model: env_or("AI_MODEL", "llama3.1"),
            ai_base_url: env::var("AI_BASE_URL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            ai_timeout: Duration::from_secs(parsed_env("AI_TIMEOUT_SECS", 30)),
            ai_fallback_enabled: parsed_env("AI_FALLBACK_ENABLED", true),
            geocode_base_url: env_or("GEOCODE_BASE_URL", "https://nominatim.openstreetmap.org"),
            routing_base_url: env_or("ROUTING_BASE_URL", "https://router.project-osrm.org"),
            enrichment_timeout: Duration::from_secs(parsed_env("ENRICHMENT_TIMEOUT_SECS", 10)),
            scrape_timeout: Duration::from_secs(parsed_env("SCRAPE_TIMEOUT_SECS", 20)),
            region_avg_price_m2: parsed_env("REGION_AVG_PRICE_M2", 4200),
            limits: ValidationLimits {
                build_year_min: parsed_env("BUILD_YEAR_MIN", 1500),
                build_year_max: parsed_env("BUILD_YEAR_MAX", 2030),
                living_area_min_m2: parsed_env("LIVING_AREA_MIN_M2", 10.0),
                living_area_max_m2: parsed_env("LIVING_AREA_MAX_M2", 2000.0),
                max_rooms: parsed_env("MAX_ROOMS", 25),
                max_bedrooms: parsed_env("MAX_BEDROOMS", 15),
            },
            kpi: KpiThresholds {
                family_min_area_m2: parsed_env("FAMILY_MIN_AREA_M2", 100.0),
                family_min_bedrooms: parsed_env("FAMILY_MIN_BEDROOMS", 3),
            },
            web_host: env_or("WEB_HOST", "127.0.0.1"),
            web_port: parsed_env("WEB_PORT", 8080),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| format!("sqlite://{data_dir}/woonrapport.db?mode=rwc")),
            data_dir,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
