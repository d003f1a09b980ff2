//! Rolling FPS estimate
//!
//! Written by the capture thread only, read best-effort from any thread.
//! The estimate is recomputed once per wall-clock second; the window (frame
//! count and start time) resets on that same cycle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Lock-free FPS counter
#[derive(Debug)]
pub struct FpsCounter {
    epoch: Instant,
    window_start_micros: AtomicU64,
    frames_in_window: AtomicU64,
    fps_bits: AtomicU64,
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FpsCounter {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            window_start_micros: AtomicU64::new(0),
            frames_in_window: AtomicU64::new(0),
            fps_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Start a fresh window at `now` and clear the estimate
    pub fn reset(&self, now: Instant) {
        self.window_start_micros
            .store(self.micros_since_epoch(now), Ordering::Relaxed);
        self.frames_in_window.store(0, Ordering::Relaxed);
        self.fps_bits.store(0f64.to_bits(), Ordering::Relaxed);
    }

    /// Count one published frame
    pub fn record_frame(&self) {
        self.frames_in_window.fetch_add(1, Ordering::Relaxed);
    }

    /// Recompute if a full window has elapsed
    ///
    /// Returns the new estimate on the cycle it is recomputed.
    pub fn tick(&self, now: Instant) -> Option<f64> {
        let start = Duration::from_micros(self.window_start_micros.load(Ordering::Relaxed));
        let elapsed = now.saturating_duration_since(self.epoch + start);
        if elapsed < WINDOW {
            return None;
        }

        let frames = self.frames_in_window.swap(0, Ordering::Relaxed);
        let fps = frames as f64 / elapsed.as_secs_f64();
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
        self.window_start_micros
            .store(self.micros_since_epoch(now), Ordering::Relaxed);
        Some(fps)
    }

    /// Latest estimate (0 until the first full window)
    pub fn fps(&self) -> f64 {
        f64::from_bits(self.fps_bits.load(Ordering::Relaxed))
    }

    /// Frames counted in the current window
    pub fn frames_in_window(&self) -> u64 {
        self.frames_in_window.load(Ordering::Relaxed)
    }

    fn micros_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_micros() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_estimate_before_full_window() {
        let counter = FpsCounter::new();
        let t0 = Instant::now();
        counter.reset(t0);
        counter.record_frame();

        assert_eq!(counter.tick(t0 + Duration::from_millis(500)), None);
        assert_eq!(counter.fps(), 0.0);
        assert_eq!(counter.frames_in_window(), 1);
    }

    #[test]
    fn test_recompute_resets_window() {
        let counter = FpsCounter::new();
        let t0 = Instant::now();
        counter.reset(t0);
        for _ in 0..30 {
            counter.record_frame();
        }

        let fps = counter.tick(t0 + Duration::from_secs(1)).unwrap();
        assert!((fps - 30.0).abs() < 1e-3);
        assert_eq!(counter.frames_in_window(), 0);
        assert!((counter.fps() - 30.0).abs() < 1e-3);

        // New window starts at the recompute instant
        assert_eq!(counter.tick(t0 + Duration::from_millis(1500)), None);
        let fps = counter.tick(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(fps, 0.0);
    }
}
