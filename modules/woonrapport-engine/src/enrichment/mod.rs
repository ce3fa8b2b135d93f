//! Best-effort public-data lookups.
//!
//! Every source returns an explicit Result; the caller turns each
//! outcome into a Source Log entry. A failed or slow source never
//! aborts the run — partial enrichment is the expected steady state.

pub mod geocode;
pub mod travel;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use woonrapport_common::{FactStore, SourceLogEntry};

use crate::traits::EnrichmentSource;

pub use geocode::GeocodeSource;
pub use travel::TravelTimeSource;

/// Run all sources in order against a working copy of the facts, so a
/// later source (travel time) sees what an earlier one (geocoding)
/// contributed. Returns the combined fragment and the Source Log
/// entries for every attempt.
pub async fn enrich_all(
    sources: &[Arc<dyn EnrichmentSource>],
    facts: &FactStore,
    timeout: Duration,
) -> (FactStore, Vec<SourceLogEntry>) {
    let mut working = facts.clone();
    let mut combined = FactStore::default();
    let mut log = Vec::with_capacity(sources.len());

    for source in sources {
        match tokio::time::timeout(timeout, source.enrich(&working)).await {
            Ok(Ok(fragment)) => {
                working.merge(fragment.clone());
                combined.merge(fragment);
                log.push(SourceLogEntry::ok(source.name()));
            }
            Ok(Err(e)) => {
                warn!(source = source.name(), error = %e, "Enrichment source failed");
                log.push(SourceLogEntry::failed(source.name(), e.to_string()));
            }
            Err(_) => {
                warn!(source = source.name(), "Enrichment source timed out");
                log.push(SourceLogEntry::failed(source.name(), "timed out"));
            }
        }
    }

    (combined, log)
}
