pub mod admin;
pub mod events;
pub mod report;
pub mod runs;
