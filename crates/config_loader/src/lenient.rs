//! 逐键回退加载
//!
//! 文件缺失或无法解析时使用全部默认值；单个键无法解析或校验失败时该键
//! 保持默认值，其余键照常生效。每次回退产生一条警告。

use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::{parser, validator, ConfigLoader, DashcamConfig};

/// 宽松加载结果
#[derive(Debug, Clone)]
pub struct LenientLoad {
    pub config: DashcamConfig,
    pub warnings: Vec<String>,
}

impl LenientLoad {
    fn defaults(warning: String) -> Self {
        warn!("{warning}");
        Self {
            config: DashcamConfig::default(),
            warnings: vec![warning],
        }
    }
}

pub(crate) fn load(path: &Path) -> LenientLoad {
    let format = match ConfigLoader::detect_format(path) {
        Ok(format) => format,
        Err(e) => {
            return LenientLoad::defaults(format!(
                "Config file {}: {e}; using defaults",
                path.display()
            ))
        }
    };

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return LenientLoad::defaults(format!(
                "Failed to read config file {}: {e}; using defaults",
                path.display()
            ))
        }
    };

    let document = match parser::parse_value(&content, format) {
        Ok(Value::Object(document)) => document,
        Ok(_) => {
            return LenientLoad::defaults(format!(
                "Config file {} is not a table; using defaults",
                path.display()
            ))
        }
        Err(e) => {
            return LenientLoad::defaults(format!(
                "Failed to parse config file {}: {e}; using defaults",
                path.display()
            ))
        }
    };

    merge(document)
}

/// 把文档逐键叠加到默认配置上
pub(crate) fn merge(document: Map<String, Value>) -> LenientLoad {
    let mut merger = Merger::new();

    for (key, value) in document {
        match (merger.current.get(&key), value) {
            (Some(Value::Object(_)), Value::Object(fields)) => {
                for (field, value) in fields {
                    merger.overlay(&[key.as_str(), field.as_str()], value);
                }
            }
            (Some(_), value) => merger.overlay(&[key.as_str()], value),
            (None, _) => merger.warn(format!("Unknown config key '{key}' ignored")),
        }
    }

    merger.finish()
}

struct Merger {
    current: Value,
    config: DashcamConfig,
    warnings: Vec<String>,
}

impl Merger {
    fn new() -> Self {
        let config = DashcamConfig::default();
        Self {
            current: serde_json::to_value(&config).unwrap_or_default(),
            config,
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: String) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// 尝试设置一个键，解析或校验失败则保留原值
    fn overlay(&mut self, path: &[&str], value: Value) {
        let dotted = path.join(".");

        let mut candidate = self.current.clone();
        let Some(slot) = path
            .iter()
            .try_fold(&mut candidate, |node, key| node.get_mut(*key))
        else {
            self.warn(format!("Unknown config key '{dotted}' ignored"));
            return;
        };
        *slot = value;

        let parsed = match serde_json::from_value::<DashcamConfig>(candidate.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.warn(format!("Invalid value for '{dotted}': {e}; keeping default"));
                return;
            }
        };
        if let Err(e) = validator::validate(&parsed) {
            self.warn(format!("Invalid value for '{dotted}': {e}; keeping default"));
            return;
        }

        self.current = candidate;
        self.config = parsed;
    }

    fn finish(self) -> LenientLoad {
        LenientLoad {
            config: self.config,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_valid_keys_apply() {
        let load = merge(object(json!({
            "module_id": "rear_cam",
            "camera": { "framerate": 15 },
            "dds": { "domain_id": 4 }
        })));
        assert!(load.warnings.is_empty(), "{:?}", load.warnings);
        assert_eq!(load.config.module_id, "rear_cam");
        assert_eq!(load.config.camera.framerate, 15);
        assert_eq!(load.config.dds.domain_id, 4);
    }

    #[test]
    fn test_bad_key_falls_back_alone() {
        let load = merge(object(json!({
            "camera": { "framerate": -5, "brightness": 70 },
            "runtime": { "heartbeat_interval_ms": "soon" }
        })));
        assert_eq!(load.warnings.len(), 2);
        assert_eq!(load.config.camera.framerate, 30);
        assert_eq!(load.config.camera.brightness, 70);
        assert_eq!(load.config.runtime.heartbeat_interval_ms, 1000);
    }

    #[test]
    fn test_unknown_keys_warn() {
        let load = merge(object(json!({
            "gps": { "enabled": true },
            "camera": { "zoom": 2 }
        })));
        assert_eq!(load.warnings.len(), 2);
        assert_eq!(load.config, DashcamConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let load = load(&dir.path().join("absent.toml"));
        assert_eq!(load.config, DashcamConfig::default());
        assert_eq!(load.warnings.len(), 1);
    }

    #[test]
    fn test_unparseable_file_uses_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{ not json").unwrap();
        let load = load(file.path());
        assert_eq!(load.config, DashcamConfig::default());
        assert_eq!(load.warnings.len(), 1);
    }
}
