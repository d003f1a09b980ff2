//! Capture run orchestration.

mod orchestrator;
mod stats;

pub use orchestrator::{CaptureRunner, RunnerConfig};
pub use stats::RunStats;
