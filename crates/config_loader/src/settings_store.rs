//! 持久化的 key=value 设置
//!
//! 启动时读取 `module_id` / `domain_id` / `verbosity` 覆盖配置文件中的值。
//!
//! 文件格式：每行 `key=value`，`#` 开头为注释；同名键以第一行为准。

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use contracts::{ContractError, Verbosity};
use tracing::{debug, warn};

use crate::DashcamConfig;

/// 可覆盖的键
pub const OVERRIDE_KEYS: [&str; 3] = ["module_id", "domain_id", "verbosity"];

/// 设置存储
pub trait SettingsStore: Send + Sync {
    /// 读取一个键，不存在时返回 `None`
    fn read(&self, key: &str) -> Result<Option<String>, ContractError>;

    /// 写入一个键 (已存在则原位替换，否则追加)
    fn write(&self, key: &str, value: &str) -> Result<(), ContractError>;
}

/// 基于文本文件的设置存储
#[derive(Debug)]
pub struct KeyValueFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl KeyValueFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_lines(&self) -> Result<Vec<String>, ContractError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 解析一行，返回 (key, value)
fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

impl SettingsStore for KeyValueFileStore {
    fn read(&self, key: &str) -> Result<Option<String>, ContractError> {
        Ok(self
            .read_lines()?
            .iter()
            .filter_map(|line| split_line(line))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), ContractError> {
        if key.is_empty() || key.contains('=') || key.contains('\n') || value.contains('\n') {
            return Err(ContractError::config_validation(
                key,
                "keys must be non-empty without '=' and values must be single-line",
            ));
        }

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut lines = self.read_lines()?;
        let entry = format!("{key}={value}");
        match lines
            .iter()
            .position(|line| split_line(line).is_some_and(|(k, _)| k == key))
        {
            Some(idx) => lines[idx] = entry,
            None => lines.push(entry),
        }

        // 临时文件 + rename，原文件不会被截断
        let tmp = self.path.with_extension("tmp");
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!(key, path = %self.path.display(), "setting written");
        Ok(())
    }
}

/// 用存储中的值覆盖配置
///
/// 无法读取或解析的值跳过，返回对应警告。
pub fn apply_overrides(config: &mut DashcamConfig, store: &dyn SettingsStore) -> Vec<String> {
    let mut warnings = Vec::new();

    for key in OVERRIDE_KEYS {
        let value = match store.read(key) {
            Ok(Some(value)) => value,
            Ok(None) => continue,
            Err(e) => {
                warnings.push(format!("Failed to read setting '{key}': {e}"));
                continue;
            }
        };

        let applied = match key {
            "module_id" if !value.is_empty() => {
                config.module_id = value.clone();
                true
            }
            "domain_id" => value.parse().map(|id| config.dds.domain_id = id).is_ok(),
            "verbosity" => Verbosity::parse(&value)
                .map(|v| config.runtime.verbosity = v)
                .is_some(),
            _ => false,
        };
        if !applied {
            warnings.push(format!("Invalid stored value for '{key}': '{value}'"));
        }
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    warnings
}
