//! Module runtime error types

use contracts::{ContractError, ModuleId, ModuleState};
use thiserror::Error;

/// Runtime-specific errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Bus or contract level failure (connect, publish, subscribe)
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Lifecycle call made from a terminal state
    #[error("module '{module_id}' is in terminal state {state}")]
    Terminal {
        module_id: ModuleId,
        state: ModuleState,
    },

    /// A capability hook failed; the module is now in `Error`
    #[error("module '{module_id}' hook '{hook}' failed: {source}")]
    HookFailed {
        module_id: ModuleId,
        hook: &'static str,
        #[source]
        source: ContractError,
    },
}

impl RuntimeError {
    /// Create a terminal state error
    pub fn terminal(module_id: ModuleId, state: ModuleState) -> Self {
        Self::Terminal { module_id, state }
    }

    /// Create a hook failure error
    pub fn hook_failed(module_id: ModuleId, hook: &'static str, source: ContractError) -> Self {
        Self::HookFailed {
            module_id,
            hook,
            source,
        }
    }
}

/// Runtime result alias
pub type Result<T> = std::result::Result<T, RuntimeError>;
