//! Mock camera implementation
//!
//! Implements `CameraDevice`, generates a moving BGR test pattern.
//! Used for testing and development without camera hardware, with knobs to
//! inject the failures a real driver produces (missing frames, open failure,
//! a capture call that hangs).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use contracts::{CameraSettings, ContractError, ImageFrame, PixelFormat, Resolution};
use tracing::{debug, trace};

use crate::CameraDevice;

/// Mock camera configuration
#[derive(Debug, Clone, Default)]
pub struct MockCameraConfig {
    /// Simulated exposure/readout time per capture
    pub capture_delay: Duration,
    /// Return no frame on every Nth capture attempt
    pub absent_every: Option<u64>,
    /// Return a camera error on every Nth capture attempt
    pub error_every: Option<u64>,
    /// `open` fails with `CameraUnavailable`
    pub fail_open: bool,
    /// `start_streaming` fails on an open device
    pub fail_streaming: bool,
}

#[derive(Debug, Default)]
struct DeviceState {
    open: bool,
    streaming: bool,
    resolution: Option<Resolution>,
    settings: Option<CameraSettings>,
}

/// Mock camera
///
/// Captures block while [`MockCamera::set_hang`] is on, until the flag is
/// cleared or the device is released.
pub struct MockCamera {
    name: String,
    config: MockCameraConfig,
    state: Mutex<DeviceState>,
    hang: AtomicBool,
    released: AtomicBool,
    attempts: AtomicU64,
    frames: AtomicU64,
    opens: AtomicU64,
    releases: AtomicU64,
    settings_applied: AtomicU64,
}

impl MockCamera {
    /// Create new mock camera
    pub fn new(config: MockCameraConfig) -> Self {
        Self {
            name: "mock".to_string(),
            config,
            state: Mutex::new(DeviceState::default()),
            hang: AtomicBool::new(false),
            released: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            frames: AtomicU64::new(0),
            opens: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            settings_applied: AtomicU64::new(0),
        }
    }

    /// Create mock camera with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MockCameraConfig::default())
    }

    /// Make subsequent captures block
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Capture calls so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Frames returned so far
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u64 {
        self.releases.load(Ordering::SeqCst)
    }

    /// `apply_settings` calls so far
    pub fn settings_applied(&self) -> u64 {
        self.settings_applied.load(Ordering::SeqCst)
    }

    /// Settings last pushed to the device
    pub fn current_settings(&self) -> Option<CameraSettings> {
        self.lock().settings.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Diagonal gradient shifted by the frame counter
    fn pattern(resolution: Resolution, frame_no: u64, brightness: u8) -> Bytes {
        let (w, h) = (resolution.width as usize, resolution.height as usize);
        let shift = frame_no as usize;
        let mut data = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                data.push(((x + shift) & 0xff) as u8);
                data.push(((y + shift) & 0xff) as u8);
                data.push(brightness);
            }
        }
        Bytes::from(data)
    }
}

impl CameraDevice for MockCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, resolution: Resolution) -> Result<(), ContractError> {
        if self.config.fail_open {
            return Err(ContractError::camera_unavailable("mock camera configured to fail open"));
        }

        let mut state = self.lock();
        state.open = true;
        state.resolution = Some(resolution);
        self.released.store(false, Ordering::SeqCst);
        self.opens.fetch_add(1, Ordering::SeqCst);

        debug!(camera = %self.name, %resolution, "mock camera opened");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    fn apply_settings(&self, settings: &CameraSettings) -> Result<(), ContractError> {
        let mut state = self.lock();
        if !state.open {
            return Err(ContractError::camera("apply_settings on a closed camera"));
        }
        state.resolution = Some(settings.resolution);
        state.settings = Some(settings.clone());
        self.settings_applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start_streaming(&self) -> Result<(), ContractError> {
        let mut state = self.lock();
        if !state.open {
            return Err(ContractError::camera("start_streaming on a closed camera"));
        }
        if self.config.fail_streaming {
            return Err(ContractError::camera("mock camera configured to fail streaming"));
        }
        state.streaming = true;
        Ok(())
    }

    fn stop_streaming(&self) -> Result<(), ContractError> {
        self.lock().streaming = false;
        Ok(())
    }

    fn capture(&self) -> Result<Option<ImageFrame>, ContractError> {
        while self.hang.load(Ordering::SeqCst) && !self.released.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(5));
        }

        let (resolution, brightness) = {
            let state = self.lock();
            if !state.open || !state.streaming {
                return Err(ContractError::camera("camera is not streaming"));
            }
            let brightness = state
                .settings
                .as_ref()
                .map(|s| (s.brightness.clamp(0, 100) * 255 / 100) as u8)
                .unwrap_or(128);
            (state.resolution, brightness)
        };
        let resolution =
            resolution.ok_or_else(|| ContractError::camera("camera opened without a resolution"))?;

        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.config.error_every.is_some_and(|n| n > 0 && attempt % n == 0) {
            return Err(ContractError::camera(format!("injected error on attempt {attempt}")));
        }
        if self.config.absent_every.is_some_and(|n| n > 0 && attempt % n == 0) {
            trace!(attempt, "mock camera: no frame");
            return Ok(None);
        }

        if !self.config.capture_delay.is_zero() {
            thread::sleep(self.config.capture_delay);
        }

        let frame_no = self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(Some(ImageFrame {
            width: resolution.width,
            height: resolution.height,
            format: PixelFormat::Bgr8,
            data: Self::pattern(resolution, frame_no, brightness),
        }))
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        let mut state = self.lock();
        if state.open {
            self.releases.fetch_add(1, Ordering::SeqCst);
            debug!(camera = %self.name, "mock camera released");
        }
        state.open = false;
        state.streaming = false;
    }
}
