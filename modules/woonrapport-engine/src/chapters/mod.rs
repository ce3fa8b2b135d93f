pub mod generator;
pub mod heuristics;
pub mod narrative;
pub mod ownership;
pub mod validate;

pub use generator::{ChapterGenerator, GeneratedChapters, UNKNOWN_MARKER};
pub use ownership::{owner_of, ChapterSpec, CHAPTERS};
pub use validate::consistency_checks;
