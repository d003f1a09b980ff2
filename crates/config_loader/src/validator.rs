//! 配置校验模块
//!
//! 校验规则：
//! - derive 规则 (字段范围、非空)
//! - module_id 只含 `[A-Za-z0-9_-]` (用于拼接 `/{module_id}/config`)
//! - image / control / status 主题互不相同
//! - auto_load 时标定文件路径非空

use std::collections::HashSet;

use contracts::ContractError;
use validator::{Validate, ValidationErrors};

use crate::DashcamConfig;

/// 校验 DashcamConfig
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &DashcamConfig) -> Result<(), ContractError> {
    config.validate().map_err(from_validation_errors)?;
    validate_module_id(config)?;
    validate_topics(config)?;
    validate_calibration(config)?;
    Ok(())
}

/// 把 validator 的错误树展平成第一个字段错误
pub fn from_validation_errors(errors: ValidationErrors) -> ContractError {
    fn first(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
        for (field, kind) in errors.errors() {
            let path = if prefix.is_empty() {
                field.to_string()
            } else {
                format!("{prefix}.{field}")
            };
            match kind {
                validator::ValidationErrorsKind::Field(errs) => {
                    if let Some(err) = errs.first() {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("failed '{}' check", err.code));
                        return Some((path, message));
                    }
                }
                validator::ValidationErrorsKind::Struct(inner) => {
                    if let Some(found) = first(inner, &path) {
                        return Some(found);
                    }
                }
                validator::ValidationErrorsKind::List(items) => {
                    for (idx, inner) in items {
                        if let Some(found) = first(inner, &format!("{path}[{idx}]")) {
                            return Some(found);
                        }
                    }
                }
            }
        }
        None
    }

    match first(&errors, "") {
        Some((field, message)) => ContractError::config_validation(field, message),
        None => ContractError::config_validation("<root>", errors.to_string()),
    }
}

fn validate_module_id(config: &DashcamConfig) -> Result<(), ContractError> {
    let valid = config
        .module_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(ContractError::config_validation(
            "module_id",
            format!(
                "module_id '{}' may only contain letters, digits, '_' and '-'",
                config.module_id
            ),
        ));
    }
    Ok(())
}

fn validate_topics(config: &DashcamConfig) -> Result<(), ContractError> {
    let dds = &config.dds;
    let mut seen = HashSet::new();
    for (field, topic) in [
        ("dds.image_topic", &dds.image_topic),
        ("dds.control_topic", &dds.control_topic),
        ("dds.status_topic", &dds.status_topic),
    ] {
        if !seen.insert(topic.as_str()) {
            return Err(ContractError::config_validation(
                field,
                format!("duplicate topic '{topic}'"),
            ));
        }
    }
    Ok(())
}

fn validate_calibration(config: &DashcamConfig) -> Result<(), ContractError> {
    if config.calibration.auto_load && config.calibration.file.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "calibration.file",
            "calibration file cannot be empty when auto_load is set",
        ));
    }
    Ok(())
}
