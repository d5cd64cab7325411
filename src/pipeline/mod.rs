// file: src/pipeline/mod.rs
// description: pipeline orchestration module exports
// reference: internal module structure

pub mod orchestrator;
pub mod progress;

pub use orchestrator::{Orchestrator, RunOptions};
pub use progress::{ProgressTracker, RunSummary};
