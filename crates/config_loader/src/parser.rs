//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON 格式。

use contracts::ContractError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析
pub fn parse<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// 解析为无类型的 JSON 树 (逐键回退时使用)
pub fn parse_value(content: &str, format: ConfigFormat) -> Result<Value, ContractError> {
    match format {
        ConfigFormat::Toml => {
            let table: toml::Table = parse_toml(content)?;
            serde_json::to_value(table)
                .map_err(|e| ContractError::config_parse(format!("TOML conversion error: {e}")))
        }
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DashcamConfig;

    #[test]
    fn test_parse_toml_partial() {
        let content = r#"
module_id = "front_cam"

[camera]
resolution = [1280, 720]
framerate = 15
"#;
        let config: DashcamConfig = parse_toml(content).unwrap();
        assert_eq!(config.module_id, "front_cam");
        assert_eq!(config.camera.framerate, 15);
        assert_eq!(config.camera.brightness, 50);
        assert_eq!(config.dds.image_topic, "camera/raw_images");
    }

    #[test]
    fn test_parse_json_partial() {
        let content = r#"{ "dds": { "domain_id": 7, "backend": "noop" } }"#;
        let config: DashcamConfig = parse_json(content).unwrap();
        assert_eq!(config.dds.domain_id, 7);
        assert_eq!(config.dds.backend, contracts::BusBackend::Noop);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let result = parse_toml::<DashcamConfig>("invalid toml [[[");
        assert!(matches!(result, Err(ContractError::ConfigParse { .. })));
    }

    #[test]
    fn test_parse_value_from_toml() {
        let value = parse_value("[camera]\nframerate = 10\n", ConfigFormat::Toml).unwrap();
        assert_eq!(value["camera"]["framerate"], 10);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("toml"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
