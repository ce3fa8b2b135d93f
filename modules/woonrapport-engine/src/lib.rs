//! Report engine: scraping, parsing, enrichment, KPI computation and
//! chapter generation, driven by the pipeline runner. The HTTP boundary
//! and persistence live in the api crate behind the `RunStore` trait.

pub mod chapters;
pub mod enrichment;
pub mod kpi;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod scraper;
pub mod traits;

pub use chapters::{consistency_checks, ChapterGenerator};
pub use pipeline::{CancelFlag, PipelineDeps, PipelineRunner, ProgressBus};
pub use scraper::HttpScraper;
pub use traits::{EnrichmentSource, PageScraper, RunStore};
