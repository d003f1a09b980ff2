//! Capture error types

use thiserror::Error;

/// Capture-specific errors
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Contract level failure (camera, bus, calibration)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),

    /// Module runtime failure
    #[error(transparent)]
    Runtime(#[from] module_runtime::RuntimeError),

    /// Capture thread could not be spawned
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Capture thread did not finish within the join timeout
    #[error("capture thread did not stop within {timeout_ms} ms")]
    JoinTimeout { timeout_ms: u64 },
}

/// Capture result alias
pub type Result<T> = std::result::Result<T, CaptureError>;
