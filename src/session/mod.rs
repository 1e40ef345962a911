pub mod orchestrator;
pub mod report;
pub mod sticky;
