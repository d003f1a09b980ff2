//! Layered error definitions
//!
//! Categorized by source: config / bus / camera / calibration / lifecycle

use thiserror::Error;

use crate::ModuleState;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Bus Errors =====
    /// Bus domain could not be joined
    #[error("bus unreachable for domain {domain_id}: {message}")]
    BusUnreachable { domain_id: u32, message: String },

    /// Publish failed
    #[error("publish to '{topic}' failed: {message}")]
    Publish { topic: String, message: String },

    /// Subscribe failed
    #[error("subscribe to '{topic}' failed: {message}")]
    Subscribe { topic: String, message: String },

    // ===== Camera Errors =====
    /// Camera resource could not be opened
    #[error("camera unavailable: {message}")]
    CameraUnavailable { message: String },

    /// Camera operation failed on an opened device
    #[error("camera error: {message}")]
    Camera { message: String },

    // ===== Calibration Errors =====
    /// Undistortion failed for one frame
    #[error("undistort failed: {message}")]
    Undistort { message: String },

    /// Calibration record is malformed
    #[error("invalid calibration: {message}")]
    InvalidCalibration { message: String },

    // ===== Lifecycle Errors =====
    /// Lifecycle transition not permitted from the current state
    #[error("invalid lifecycle transition from {from:?} to {to:?}")]
    InvalidTransition { from: ModuleState, to: ModuleState },

    /// A lifecycle hook failed
    #[error("lifecycle hook '{hook}' failed: {message}")]
    Hook { hook: &'static str, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create bus unreachable error
    pub fn bus_unreachable(domain_id: u32, message: impl Into<String>) -> Self {
        Self::BusUnreachable {
            domain_id,
            message: message.into(),
        }
    }

    /// Create publish error
    pub fn publish(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Create camera unavailable error
    pub fn camera_unavailable(message: impl Into<String>) -> Self {
        Self::CameraUnavailable {
            message: message.into(),
        }
    }

    /// Create camera error
    pub fn camera(message: impl Into<String>) -> Self {
        Self::Camera {
            message: message.into(),
        }
    }

    /// Create undistort error
    pub fn undistort(message: impl Into<String>) -> Self {
        Self::Undistort {
            message: message.into(),
        }
    }

    /// Create invalid calibration error
    pub fn invalid_calibration(message: impl Into<String>) -> Self {
        Self::InvalidCalibration {
            message: message.into(),
        }
    }

    /// Create hook error
    pub fn hook(hook: &'static str, message: impl Into<String>) -> Self {
        Self::Hook {
            hook,
            message: message.into(),
        }
    }
}
