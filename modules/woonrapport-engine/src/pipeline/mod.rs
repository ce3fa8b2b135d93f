pub mod progress;
pub mod runner;

pub use progress::ProgressBus;
pub use runner::{CancelFlag, PipelineDeps, PipelineRunner};
