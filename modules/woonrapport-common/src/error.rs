use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data firewall violation in chapter {slot}: {invariant}")]
    FirewallViolation { slot: u8, invariant: String },

    #[error("Run {0} not found")]
    RunNotFound(uuid::Uuid),

    #[error("Run cancelled by user")]
    Cancelled,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
