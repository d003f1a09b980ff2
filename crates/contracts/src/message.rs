//! Standard bus payloads: logging, heartbeat, configuration, status
//!
//! Every module mounts the same three standard topics (see [`crate::topics`]).
//! Image payloads live in [`crate::frame`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{ImageMessage, ModuleId, ModuleState};

/// Wall-clock milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wall-clock microseconds since the Unix epoch
pub fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Log severity carried on the `/logging` topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// How much of a module's log stream reaches the bus
///
/// Numeric form (CLI `-v` count, settings store): 0 silent .. 4 debug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl Verbosity {
    /// Map a numeric level, clamping anything above 4 to `Debug`
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Silent,
            1 => Self::Error,
            2 => Self::Warn,
            3 => Self::Info,
            _ => Self::Debug,
        }
    }

    /// Numeric form
    pub fn level(self) -> u8 {
        match self {
            Self::Silent => 0,
            Self::Error => 1,
            Self::Warn => 2,
            Self::Info => 3,
            Self::Debug => 4,
        }
    }

    /// Parse from name (`"warn"`) or number (`"2"`, at most 4)
    pub fn parse(s: &str) -> Option<Self> {
        if let Ok(level) = s.trim().parse::<u8>() {
            return (level <= 4).then(|| Self::from_level(level));
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" | "none" => Some(Self::Silent),
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    /// Whether a record at `level` is published
    pub fn allows(self, level: LogLevel) -> bool {
        match self {
            Self::Silent => false,
            Self::Error => level >= LogLevel::Error,
            Self::Warn => level >= LogLevel::Warn,
            Self::Info => level >= LogLevel::Info,
            Self::Debug => true,
        }
    }
}

/// One record on the shared `/logging` topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Milliseconds since epoch
    pub timestamp: i64,

    /// Producing module
    pub module_id: ModuleId,

    /// Severity
    pub level: LogLevel,

    /// Free text
    pub text: String,
}

impl LogMessage {
    /// Stamp a new record with the current time
    pub fn new(module_id: ModuleId, level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            timestamp: now_millis(),
            module_id,
            level,
            text: text.into(),
        }
    }
}

/// Liveness signal on the shared `/heartbeat` topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// Milliseconds since epoch
    pub timestamp: i64,

    /// Producing module
    pub module_id: ModuleId,

    /// Lifecycle state at emission time
    pub status: ModuleState,
}

/// Key/value configuration update (`/{module_id}/config`, control topic)
pub type ConfigMessage = BTreeMap<String, serde_json::Value>;

/// Bus payload envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum BusMessage {
    Config(ConfigMessage),
    Log(LogMessage),
    Heartbeat(HeartbeatMessage),
    Image(ImageMessage),
    Status(serde_json::Value),
}

impl BusMessage {
    /// Payload kind (for logging/metrics labels)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Log(_) => "log",
            Self::Heartbeat(_) => "heartbeat",
            Self::Image(_) => "image",
            Self::Status(_) => "status",
        }
    }
}
