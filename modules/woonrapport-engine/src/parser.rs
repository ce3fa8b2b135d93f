//! Fact extraction from listing text.
//!
//! Pure function over readability-cleaned markdown or pasted text.
//! Unmatched fields stay absent; malformed input never errors. Parsed
//! numbers are capped to configured plausible ranges, with one warning
//! per capped field.

use std::sync::LazyLock;

use regex::Regex;

use woonrapport_common::{FactStore, ValidationLimits};

static PRICE_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:vraagprijs|koopsom|prijs)\D{0,15}€?\s*([0-9][0-9. ]{3,})").unwrap()
});
static PRICE_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"€\s*([0-9][0-9. ]{3,})").unwrap());
static LIVING_AREA_LABELED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:woonoppervlakte|woonopp\.?|wonen)\D{0,20}(\d{2,4})\s*m[²2]").unwrap()
});
static AREA_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{2,4})\s*m[²2]").unwrap());
static PLOT_AREA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)perceel(?:oppervlakte)?\D{0,20}(\d{2,5})\s*m[²2]").unwrap()
});
static VOLUME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)inhoud\D{0,20}(\d{2,5})\s*m[³3]").unwrap());
static BUILD_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:bouwjaar|gebouwd in|build year)\D{0,10}(\d{4})").unwrap());
static ENERGY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)energ(?:ielabel|y label)\s*[:\-]?\s*"?([A-G]\+{0,4})"#).unwrap()
});
static ROOMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})\s*(slaapkamers?|kamers?|badkamers?)").unwrap());
static POSTCODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([1-9][0-9]{3})\s?([A-Z]{2})\b").unwrap());
static CITY_AFTER_POSTCODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[1-9][0-9]{3}\s?[A-Z]{2} +([A-Z][\p{L}'\-]+(?: [A-Z][\p{L}'\-]+)?)").unwrap()
});
static STREET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b([A-Z][\p{L}'\-]*(?:straat|laan|weg|plein|gracht|kade|dijk|singel|hof|markt)\s+\d+[a-zA-Z]?(?:-[0-9a-zA-Z]+)?)\b",
    )
    .unwrap()
});
static INSULATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(volledig geïsoleerd|dubbel glas|hr\+\+\s*glas|dakisolatie|muurisolatie|vloerisolatie|spouwmuurisolatie)").unwrap()
});
static HEATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(stadsverwarming|warmtepomp|cv-ketel|vloerverwarming|blokverwarming)").unwrap()
});
static ROOF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(zadeldak|plat dak|schilddak|mansardedak|lessenaarsdak)").unwrap()
});
static GARDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(achtertuin|voortuin|tuin rondom|zonnige tuin|stadstuin)").unwrap()
});
static BALCONY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(dakterras|frans balkon|balkon)").unwrap());
static GARAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(inpandige garage|garage|carport|eigen parkeerplaats)").unwrap()
});
static OWNERSHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(volle eigendom|eigen grond|erfpacht)").unwrap()
});
static VVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)vve[ \-]?bijdrage\D{0,10}€?\s*([0-9][0-9.,]*)").unwrap()
});
static MEDIA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[^\s\)\]'\x22]+\.(?:jpg|jpeg|png|webp)").unwrap()
});

/// Parse listing text into a fact fragment. Never fails; garbage in,
/// empty store out.
pub fn parse_listing(text: &str, limits: &ValidationLimits) -> FactStore {
    let mut facts = FactStore::default();

    facts.asking_price_eur = PRICE_LABELED
        .captures(text)
        .or_else(|| PRICE_BARE.captures(text))
        .and_then(|c| parse_eur_amount(&c[1]))
        // Amounts under four digits are never an asking price.
        .filter(|v| *v >= 1_000);

    facts.living_area_m2 = LIVING_AREA_LABELED
        .captures(text)
        .or_else(|| AREA_BARE.captures(text))
        .and_then(|c| c[1].parse::<f64>().ok());

    facts.plot_area_m2 = PLOT_AREA.captures(text).and_then(|c| c[1].parse().ok());
    facts.volume_m3 = VOLUME.captures(text).and_then(|c| c[1].parse().ok());
    facts.build_year = BUILD_YEAR.captures(text).and_then(|c| c[1].parse().ok());
    facts.energy_label = ENERGY_LABEL
        .captures(text)
        .map(|c| c[1].to_uppercase());

    // Room counts share one pattern; "slaapkamers" would otherwise also
    // match the bare "kamers" regex.
    for caps in ROOMS.captures_iter(text) {
        let count: Option<u8> = caps[1].parse().ok();
        let kind = caps[2].to_lowercase();
        if kind.starts_with("slaap") {
            facts.bedroom_count = facts.bedroom_count.or(count);
        } else if kind.starts_with("bad") {
            facts.bathroom_count = facts.bathroom_count.or(count);
        } else {
            facts.room_count = facts.room_count.or(count);
        }
    }

    facts.postal_code = POSTCODE
        .captures(text)
        .map(|c| format!("{} {}", &c[1], &c[2]));
    facts.city = CITY_AFTER_POSTCODE.captures(text).map(|c| c[1].to_string());
    facts.address = STREET_ADDRESS.captures(text).map(|c| c[1].to_string());

    facts.insulation = INSULATION.captures(text).map(|c| c[1].to_string());
    facts.heating = HEATING.captures(text).map(|c| c[1].to_string());
    facts.roof_type = ROOF.captures(text).map(|c| c[1].to_string());
    facts.garden = GARDEN.captures(text).map(|c| c[1].to_string());
    facts.balcony = BALCONY.captures(text).map(|c| c[1].to_string());
    facts.garage = GARAGE.captures(text).map(|c| c[1].to_string());
    facts.ownership_type = OWNERSHIP.captures(text).map(|c| c[1].to_string());
    facts.vve_contribution_eur = VVE.captures(text).and_then(|c| parse_eur_amount(&c[1]));

    for m in MEDIA_URL.find_iter(text) {
        let url = m.as_str().to_string();
        if !facts.media_urls.contains(&url) {
            facts.media_urls.push(url);
        }
    }

    validate(&mut facts, limits);
    facts
}

/// Parse a Dutch-formatted amount ("1.400.000", "1 400 000"); anything
/// after a decimal comma is dropped.
fn parse_eur_amount(raw: &str) -> Option<u64> {
    let whole = raw.split(',').next().unwrap_or(raw);
    let digits: String = whole.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Cap out-of-range values to the configured boundary, one warning per
/// capped field. Capping instead of rejecting keeps a noisy listing
/// usable.
fn validate(facts: &mut FactStore, limits: &ValidationLimits) {
    if let Some(year) = facts.build_year {
        let capped = year.clamp(limits.build_year_min, limits.build_year_max);
        if capped != year {
            facts
                .warnings
                .push(format!("build_year {year} capped to {capped}"));
            facts.build_year = Some(capped);
        }
    }

    if let Some(area) = facts.living_area_m2 {
        let capped = area.clamp(limits.living_area_min_m2, limits.living_area_max_m2);
        if (capped - area).abs() > f64::EPSILON {
            facts
                .warnings
                .push(format!("living_area_m2 {area} capped to {capped}"));
            facts.living_area_m2 = Some(capped);
        }
    }

    if let Some(rooms) = facts.room_count {
        if rooms > limits.max_rooms {
            facts
                .warnings
                .push(format!("room_count {rooms} capped to {}", limits.max_rooms));
            facts.room_count = Some(limits.max_rooms);
        }
    }

    if let Some(bedrooms) = facts.bedroom_count {
        if bedrooms > limits.max_bedrooms {
            facts.warnings.push(format!(
                "bedroom_count {bedrooms} capped to {}",
                limits.max_bedrooms
            ));
            facts.bedroom_count = Some(limits.max_bedrooms);
        }
    }

    // Cross-field: a house cannot have more bedrooms than rooms.
    if let (Some(bedrooms), Some(rooms)) = (facts.bedroom_count, facts.room_count) {
        if bedrooms > rooms {
            facts.warnings.push(format!(
                "bedroom_count {bedrooms} exceeds room_count {rooms}, capped"
            ));
            facts.bedroom_count = Some(rooms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Keizersgracht 123, 1015 CJ Amsterdam
Vraagprijs € 1.400.000 k.k.
Woonoppervlakte 453 m² · Perceel 520 m² · Inhoud 1640 m³
Bouwjaar 1979 · Energielabel B
10 kamers (4 slaapkamers, 2 badkamers)
Verwarming: cv-ketel, dubbel glas, zadeldak
Zonnige tuin en inpandige garage. Eigen grond.
VvE-bijdrage € 180 per maand
https://media.example.org/foto-1.jpg
https://media.example.org/foto-2.jpg
";

    fn limits() -> ValidationLimits {
        ValidationLimits::default()
    }

    #[test]
    fn parses_a_full_listing() {
        let facts = parse_listing(LISTING, &limits());
        assert_eq!(facts.asking_price_eur, Some(1_400_000));
        assert_eq!(facts.living_area_m2, Some(453.0));
        assert_eq!(facts.plot_area_m2, Some(520.0));
        assert_eq!(facts.volume_m3, Some(1640.0));
        assert_eq!(facts.build_year, Some(1979));
        assert_eq!(facts.energy_label.as_deref(), Some("B"));
        assert_eq!(facts.room_count, Some(10));
        assert_eq!(facts.bedroom_count, Some(4));
        assert_eq!(facts.bathroom_count, Some(2));
        assert_eq!(facts.postal_code.as_deref(), Some("1015 CJ"));
        assert_eq!(facts.city.as_deref(), Some("Amsterdam"));
        assert_eq!(facts.address.as_deref(), Some("Keizersgracht 123"));
        assert_eq!(facts.heating.as_deref(), Some("cv-ketel"));
        assert_eq!(facts.roof_type.as_deref(), Some("zadeldak"));
        assert_eq!(facts.ownership_type.as_deref(), Some("Eigen grond"));
        assert_eq!(facts.vve_contribution_eur, Some(180));
        assert_eq!(facts.media_urls.len(), 2);
        assert!(facts.warnings.is_empty());
    }

    #[test]
    fn garbage_input_yields_empty_store() {
        let facts = parse_listing("<<<>>> not a listing at all %%%", &limits());
        assert_eq!(facts, FactStore::default());
    }

    #[test]
    fn future_build_year_is_capped_with_one_warning() {
        let facts = parse_listing("Bouwjaar 3045, woonoppervlakte 120 m²", &limits());
        assert_eq!(facts.build_year, Some(2030));
        assert_eq!(facts.warnings.len(), 1);
        assert!(facts.warnings[0].contains("3045"));
    }

    #[test]
    fn bedrooms_cannot_exceed_rooms() {
        let facts = parse_listing("3 kamers waarvan 7 slaapkamers", &limits());
        assert_eq!(facts.room_count, Some(3));
        assert_eq!(facts.bedroom_count, Some(3));
        assert_eq!(facts.warnings.len(), 1);
    }

    #[test]
    fn bare_price_and_area_are_picked_up() {
        let facts = parse_listing("Prachtig huis van 88 m² voor € 450.000", &limits());
        assert_eq!(facts.asking_price_eur, Some(450_000));
        assert_eq!(facts.living_area_m2, Some(88.0));
    }
}
