// Trait seams for pipeline dependencies.
//
// PageScraper — listing page fetching behind one trait.
// EnrichmentSource — best-effort public-data lookups.
// RunStore — run persistence, implemented over SQLite by the API crate.
//
// These enable deterministic testing with mock implementations:
// no network, no database.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use woonrapport_common::{FactStore, ReportError, RunRecord};

// ---------------------------------------------------------------------------
// PageScraper
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PageScraper: Send + Sync {
    /// Fetch a listing page and reduce it to readable text.
    async fn scrape(&self, url: &str) -> Result<String>;

    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// EnrichmentSource
// ---------------------------------------------------------------------------

/// One best-effort external lookup. A failed call is recorded in the
/// Source Log by the caller and never aborts the run.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a fact fragment to merge into the store. The input store
    /// is read-only; enrichment may only add.
    async fn enrich(&self, facts: &FactStore) -> Result<FactStore>;
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn insert(&self, run: &RunRecord) -> Result<(), ReportError>;

    async fn load(&self, id: Uuid) -> Result<Option<RunRecord>, ReportError>;

    /// Overwrite the persisted row for this run. Each pipeline step
    /// persists by overwriting its JSON field, which is what makes
    /// re-running after a crash safe.
    async fn update(&self, run: &RunRecord) -> Result<(), ReportError>;

    /// Operator-triggered cleanup: delete done/failed runs last updated
    /// before the cutoff. Returns the number of rows removed.
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, ReportError>;
}
