//! # Contracts
//!
//! Frozen interface contracts shared by every dashcam module.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Log and heartbeat timestamps: wall-clock milliseconds since epoch
//! - Frame timestamps: wall-clock microseconds since epoch, stamped at acquisition
//! - `sequence_id` is per capture run, used for ordering/loss detection

mod bus;
mod calibration;
mod camera;
mod capability;
mod error;
mod frame;
mod message;
mod module_id;
mod state;
pub mod topics;

pub use bus::*;
pub use calibration::*;
pub use camera::*;
pub use capability::*;
pub use error::*;
pub use frame::*;
pub use message::*;
pub use module_id::{DomainId, ModuleId, ModuleIdentity};
pub use state::ModuleState;
