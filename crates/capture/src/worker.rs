//! Capture worker - the dedicated acquisition thread
//!
//! One thread per run. Each iteration:
//! 1. reads one settings snapshot
//! 2. sleeps the rest of `1/framerate` since the previous attempt (wakes on stop)
//! 3. acquires, corrects (if calibrated), stamps metadata, publishes
//! 4. recomputes FPS once per second
//!
//! Pacing is measured from the start of the previous attempt, successful or
//! not, so failures retry at the frame rate and a slow iteration never causes
//! a burst of catch-up frames.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{
    now_micros, BusMessage, CalibrationRecord, FrameMetadata, ImageMessage, MessageBus, ModuleId,
};
use module_runtime::ModuleLogger;
use observability::metrics::{
    record_capture_failure, record_fps, record_frame_published, record_iteration_ms,
    record_undistort_failure,
};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::{CameraDevice, CaptureError, FpsCounter, Result, SettingsCell, Undistorter};

/// Stop flag with an interruptible wait
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake any waiter
    pub fn request(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cv.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`; returns `true` if stop was requested
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = self
            .cv
            .wait_timeout_while(stopped, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

/// Cumulative capture counters
#[derive(Debug, Default)]
pub struct CaptureCounters {
    frames_published: AtomicU64,
    capture_failures: AtomicU64,
    undistort_failures: AtomicU64,
    publish_failures: AtomicU64,
    runs: AtomicU64,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureMetrics {
    pub frames_published: u64,
    pub capture_failures: u64,
    pub undistort_failures: u64,
    pub publish_failures: u64,
    pub runs: u64,
}

impl CaptureCounters {
    pub fn snapshot(&self) -> CaptureMetrics {
        CaptureMetrics {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            undistort_failures: self.undistort_failures.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
        }
    }
}

/// Everything one capture run needs
pub(crate) struct CaptureLoop {
    pub module_id: ModuleId,
    pub bus: Arc<dyn MessageBus>,
    pub logger: ModuleLogger,
    pub image_topic: String,
    pub camera: Arc<dyn CameraDevice>,
    pub settings: Arc<SettingsCell>,
    pub calibration: Arc<CalibrationRecord>,
    pub undistorter: Arc<dyn Undistorter>,
    pub fps: Arc<FpsCounter>,
    pub counters: Arc<CaptureCounters>,
    pub stop: Arc<StopSignal>,
}

impl CaptureLoop {
    fn run(&self) {
        self.fps.reset(Instant::now());
        self.logger.info("Starting capture loop");

        let mut sequence_id: u64 = 0;
        let mut last_attempt: Option<Instant> = None;

        while !self.stop.is_requested() {
            let settings = self.settings.snapshot();
            let interval = Duration::from_secs_f64(settings.frame_interval_secs());

            if let Some(last) = last_attempt {
                let elapsed = last.elapsed();
                if elapsed < interval && self.stop.wait_timeout(interval - elapsed) {
                    break;
                }
            }

            let started = Instant::now();
            last_attempt = Some(started);
            self.iterate(&mut sequence_id);
            record_iteration_ms(&self.module_id, started.elapsed().as_secs_f64() * 1000.0);

            if let Some(fps) = self.fps.tick(Instant::now()) {
                record_fps(&self.module_id, fps);
                self.logger.info(format!("Current FPS: {fps:.1}"));
            }
        }

        self.logger
            .info(format!("Capture loop finished after {sequence_id} frames"));
    }

    fn iterate(&self, sequence_id: &mut u64) {
        let frame = match self.camera.capture() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.counters.capture_failures.fetch_add(1, Ordering::Relaxed);
                record_capture_failure(&self.module_id, "no_frame");
                self.logger.warn("No frame from camera, retrying");
                return;
            }
            Err(e) => {
                self.counters.capture_failures.fetch_add(1, Ordering::Relaxed);
                record_capture_failure(&self.module_id, "camera_error");
                self.logger.error(format!("Failed to capture frame: {e}"));
                return;
            }
        };
        let timestamp_micros = now_micros();

        // A capture that outlived stop() must not reach the image topic
        if self.stop.is_requested() {
            debug!("dropping frame captured after stop was requested");
            return;
        }

        let frame = if self.calibration.calibrated {
            match self.undistorter.undistort(&frame, &self.calibration) {
                Ok(corrected) => corrected,
                Err(e) => {
                    self.counters
                        .undistort_failures
                        .fetch_add(1, Ordering::Relaxed);
                    record_undistort_failure(&self.module_id);
                    self.logger
                        .warn(format!("Undistortion failed, publishing uncorrected frame: {e}"));
                    frame
                }
            }
        } else {
            frame
        };

        let seq = *sequence_id;
        *sequence_id += 1;
        let metadata =
            FrameMetadata::for_frame(&frame, seq, timestamp_micros, self.module_id.clone());
        let bytes = frame.data.len();

        match self.bus.publish(
            &self.image_topic,
            BusMessage::Image(ImageMessage {
                metadata,
                data: frame.data,
            }),
        ) {
            Ok(()) => {
                self.counters.frames_published.fetch_add(1, Ordering::Relaxed);
                self.fps.record_frame();
                record_frame_published(&self.module_id, seq, bytes);
                trace!(sequence_id = seq, bytes, "frame published");
            }
            Err(e) => {
                self.counters.publish_failures.fetch_add(1, Ordering::Relaxed);
                self.logger.error(format!("Failed to publish frame {seq}: {e}"));
            }
        }
    }
}

/// Handle to a running capture thread
pub struct CaptureWorker {
    handle: Option<JoinHandle<()>>,
    stop: Arc<StopSignal>,
    // Never sent on; disconnects when the thread exits (normally or by panic)
    done: mpsc::Receiver<()>,
}

impl CaptureWorker {
    /// Spawn the capture thread
    pub(crate) fn spawn(capture: CaptureLoop) -> Result<Self> {
        let stop = capture.stop.clone();
        let (done_tx, done) = mpsc::channel::<()>();
        capture.counters.runs.fetch_add(1, Ordering::Relaxed);

        let handle = thread::Builder::new()
            .name(format!("capture-{}", capture.module_id))
            .spawn(move || {
                let _done = done_tx;
                capture.run();
            })
            .map_err(CaptureError::Spawn)?;

        debug!("capture thread spawned");
        Ok(Self {
            handle: Some(handle),
            stop,
            done,
        })
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    /// Request stop and wait at most `timeout` for the thread to exit
    ///
    /// # Errors
    /// `CaptureError::JoinTimeout` if the thread is still running. The handle
    /// is kept, so [`CaptureWorker::is_finished`] keeps tracking the thread
    /// and a later call can reap it.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.stop.request();

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let exited = handle.is_finished()
            || matches!(
                self.done.recv_timeout(timeout),
                Ok(()) | Err(RecvTimeoutError::Disconnected)
            );
        if !exited {
            self.handle = Some(handle);
            return Err(CaptureError::JoinTimeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        if handle.join().is_err() {
            warn!("capture thread panicked");
        }
        Ok(())
    }
}
