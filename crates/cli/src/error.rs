//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Module could not join the bus or open the camera
    #[error("Module '{module_id}' failed to start: {message}")]
    Startup { module_id: String, message: String },

    /// Module entered the terminal Error state while running
    #[error("Module '{module_id}' faulted while running")]
    ModuleFaulted { module_id: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn startup(module_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Startup {
            module_id: module_id.into(),
            message: message.into(),
        }
    }

    pub fn module_faulted(module_id: impl Into<String>) -> Self {
        Self::ModuleFaulted {
            module_id: module_id.into(),
        }
    }
}
