//! # Module Runtime
//!
//! Framework every dashcam module runs on.
//!
//! - [`ModuleContext`]: identity + bus handle + logger, built by connecting
//!   to a domain (fatal if unreachable)
//! - [`ModuleRuntime`]: lifecycle state machine, config topic, heartbeat
//! - [`ConfigTable`]: explicit key → typed setter table for config merges
//! - [`LivenessMonitor`]: consumer side of `/heartbeat`
//!
//! ## Usage
//!
//! ```ignore
//! let ctx = ModuleContext::connect(ModuleParams::new("camera_interface", 0), &connector)?;
//! let runtime = ModuleRuntime::mount(ctx, module)?;
//! runtime.start()?;
//! loop {
//!     runtime.tick()?;
//!     std::thread::sleep(Duration::from_secs(1));
//! }
//! ```

pub mod config_table;
mod context;
mod error;
mod liveness;
mod logger;
mod runtime;

pub use config_table::{ConfigTable, Setter};
pub use context::{ModuleContext, ModuleParams};
pub use error::{Result, RuntimeError};
pub use liveness::{LastSeen, LivenessMonitor};
pub use logger::ModuleLogger;
pub use runtime::{ModuleRuntime, VERBOSITY_KEY};
