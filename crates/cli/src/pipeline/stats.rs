//! Run statistics.

use std::time::Duration;

use contracts::ModuleState;
use observability::CaptureStatsAggregator;

/// Statistics from one `run`
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Module that was run
    pub module_id: String,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Lifecycle state after stop
    pub final_state: ModuleState,

    /// Heartbeats emitted
    pub heartbeats: u64,

    /// Status snapshots published
    pub status_reports: u64,

    /// Sampled capture counters
    pub capture: CaptureStatsAggregator,
}

impl RunStats {
    /// Published frames per second over the whole run
    pub fn average_fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.capture.last.frames_published as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Module: {} ({})", self.module_id, self.final_state);
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Average FPS: {:.2}", self.average_fps());
        println!("Heartbeats: {}", self.heartbeats);
        println!("Status reports: {}", self.status_reports);
        println!();
        print!("{}", self.capture.summary());
        println!();
    }
}
