use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use woonrapport_common::FactStore;

use crate::traits::EnrichmentSource;

/// Reference destination for the commute estimate: Utrecht Centraal,
/// roughly the centre of the national rail network.
const REF_POINT: (f64, f64) = (52.0894, 5.1100);

/// Driving-time estimate against an OSRM-compatible router, from the
/// geocoded listing location to the reference point. Requires the
/// geocode source to have run first.
pub struct TravelTimeSource {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    /// Seconds.
    duration: f64,
}

impl TravelTimeSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl EnrichmentSource for TravelTimeSource {
    fn name(&self) -> &str {
        "travel_time"
    }

    async fn enrich(&self, facts: &FactStore) -> Result<FactStore> {
        let (lat, lon) = match (facts.latitude, facts.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(anyhow!("no coordinates available, geocoding missing")),
        };

        debug!(lat, lon, "Travel time lookup");

        let url = format!(
            "{}/route/v1/driving/{lon},{lat};{},{}",
            self.base_url, REF_POINT.1, REF_POINT.0
        );
        let response: RouteResponse = self
            .http
            .get(&url)
            .query(&[("overview", "false")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no route in response"))?;

        let minutes = (route.duration / 60.0).round() as u64;
        Ok(FactStore {
            extra_notes: vec![format!("reistijd naar Utrecht Centraal: ca. {minutes} min")],
            ..Default::default()
        })
    }
}
