pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, KpiThresholds, ValidationLimits};
pub use error::ReportError;
pub use types::*;
