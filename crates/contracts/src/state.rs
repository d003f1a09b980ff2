//! ModuleState - 模块生命周期状态机
//!
//! ```text
//! Unknown ──construct──► Starting ──start──► Running ──stop──► Stopping ──► Stopped
//!    │                      │                   │                 │
//!    └──────────────────────┴───── fault ───────┴─────────────────┴──► Error
//! ```
//!
//! `Stopped` 与 `Error` 为终态。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 模块状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModuleState {
    #[default]
    Unknown,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl ModuleState {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }

    /// 状态转换是否合法
    ///
    /// 任何非终态都可以转入 `Error`。
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Unknown, Starting)
                | (Starting, Running)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (_, Error)
        )
    }

    /// 状态名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use ModuleState::*;
        assert!(Unknown.can_transition_to(Starting));
        assert!(Starting.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Stopped));
    }

    #[test]
    fn test_terminal_states_are_final() {
        use ModuleState::*;
        for next in [Unknown, Starting, Running, Stopping, Stopped, Error] {
            assert!(!Stopped.can_transition_to(next));
            assert!(!Error.can_transition_to(next));
        }
    }

    #[test]
    fn test_fault_from_any_live_state() {
        use ModuleState::*;
        for from in [Unknown, Starting, Running, Stopping] {
            assert!(from.can_transition_to(Error), "{from} -> Error");
        }
    }

    #[test]
    fn test_no_skipping() {
        assert!(!ModuleState::Unknown.can_transition_to(ModuleState::Running));
        assert!(!ModuleState::Running.can_transition_to(ModuleState::Stopped));
    }
}
