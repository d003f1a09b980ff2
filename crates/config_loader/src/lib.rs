//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files into [`DashcamConfig`]
//! - Validate configuration legality
//! - Per-key fallback loading for startup ([`ConfigLoader::load_lenient`])
//! - Calibration file IO and the `key=value` settings store
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("dashcam.toml")).unwrap();
//! println!("Module: {}", config.module_id);
//! ```

mod calibration;
mod lenient;
mod parser;
mod schema;
mod settings_store;
mod validator;

pub use calibration::{load_calibration, resolve_calibration, save_calibration};
pub use lenient::LenientLoad;
pub use parser::ConfigFormat;
pub use schema::{
    CalibrationConfig, DashcamConfig, DdsConfig, RuntimeConfig, DEFAULT_CALIBRATION_FILE,
    DEFAULT_MODULE_ID,
};
pub use settings_store::{apply_overrides, KeyValueFileStore, SettingsStore, OVERRIDE_KEYS};

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<DashcamConfig, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration, falling back to defaults key by key
    ///
    /// Never fails: a missing or unreadable file yields the defaults, and
    /// every key that cannot be used keeps its default. Each fallback is
    /// returned (and logged) as a warning.
    pub fn load_lenient(path: &Path) -> LenientLoad {
        lenient::load(path)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<DashcamConfig, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already built configuration
    pub fn validate(config: &DashcamConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize DashcamConfig to TOML string
    pub fn to_toml(config: &DashcamConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize DashcamConfig to JSON string
    pub fn to_json(config: &DashcamConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Infer configuration format from file extension
    pub fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(content: &str, format: ConfigFormat) -> Result<DashcamConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }
}
