use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use woonrapport_common::FactStore;

use crate::traits::EnrichmentSource;

/// Forward geocoding against a Nominatim-compatible endpoint. Resolves
/// the listing address to coordinates the travel-time source builds on.
pub struct GeocodeSource {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
    display_name: String,
}

impl GeocodeSource {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn query_from(facts: &FactStore) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(address) = &facts.address {
            parts.push(address.clone());
        }
        if let Some(postcode) = &facts.postal_code {
            parts.push(postcode.clone());
        }
        if let Some(city) = &facts.city {
            parts.push(city.clone());
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

#[async_trait]
impl EnrichmentSource for GeocodeSource {
    fn name(&self) -> &str {
        "geocode"
    }

    async fn enrich(&self, facts: &FactStore) -> Result<FactStore> {
        let query = Self::query_from(facts)
            .ok_or_else(|| anyhow!("no address, postcode or city to geocode"))?;

        debug!(%query, "Geocode lookup");

        let url = format!("{}/search", self.base_url);
        let hits: Vec<GeocodeHit> = self
            .http
            .get(&url)
            .query(&[("format", "json"), ("limit", "1"), ("q", query.as_str())])
            .header(reqwest::header::USER_AGENT, "woonrapport/0.1")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let hit = hits
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no geocode result for \"{query}\""))?;

        let latitude: f64 = hit.lat.parse()?;
        let longitude: f64 = hit.lon.parse()?;

        Ok(FactStore {
            latitude: Some(latitude),
            longitude: Some(longitude),
            extra_notes: vec![format!("locatie bevestigd: {}", hit.display_name)],
            ..Default::default()
        })
    }
}
