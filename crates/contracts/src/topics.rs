//! Standard topic names
//!
//! Every module mounts the configuration, logging and heartbeat topics.
//! Image, control and status topic names come from configuration.

/// Shared fan-in logging topic
pub const LOGGING: &str = "/logging";

/// Shared heartbeat topic
pub const HEARTBEAT: &str = "/heartbeat";

/// Default image topic
pub const DEFAULT_IMAGE_TOPIC: &str = "camera/raw_images";

/// Default control topic
pub const DEFAULT_CONTROL_TOPIC: &str = "camera/control";

/// Default status topic
pub const DEFAULT_STATUS_TOPIC: &str = "camera/status";

/// Per-module configuration topic: `/{module_id}/config`
pub fn config_topic(module_id: &str) -> String {
    format!("/{module_id}/config")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_topic() {
        assert_eq!(config_topic("storage"), "/storage/config");
    }
}
