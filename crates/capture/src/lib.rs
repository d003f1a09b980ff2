//! # Capture
//!
//! Camera capture service for the dashcam.
//!
//! ## Data Flow
//!
//! ```text
//! CameraDevice::capture()
//!     -> Undistorter (calibrated only)
//!     -> FrameMetadata { timestamp, sequence_id, ... }
//!     -> MessageBus::publish(image_topic, ImageMessage)
//! ```
//!
//! ## Components
//!
//! - [`CameraDevice`]: hardware seam, [`MockCamera`] for tests and demos
//! - [`CaptureService`]: open / start / stop / settings / status
//! - [`CaptureWorker`]: the one acquisition thread per run
//! - [`CameraModule`]: the service mounted on a [`module_runtime::ModuleRuntime`]

mod device;
mod error;
mod fps;
mod mock;
mod module;
mod service;
mod settings;
mod undistort;
mod worker;

pub use device::CameraDevice;
pub use error::{CaptureError, Result};
pub use fps::FpsCounter;
pub use mock::{MockCamera, MockCameraConfig};
pub use module::{CameraModule, CameraModuleOptions};
pub use service::{CaptureOptions, CaptureService, CaptureStatus, DEFAULT_JOIN_TIMEOUT};
pub use settings::{camera_settings_table, SettingsCell};
pub use undistort::{NullUndistorter, RemapUndistorter, Undistorter};
pub use worker::{CaptureCounters, CaptureMetrics, CaptureWorker, StopSignal};
