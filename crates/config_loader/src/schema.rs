//! DashcamConfig - 进程配置
//!
//! 每个字段都有默认值，缺失的段或键使用默认值。

use std::path::PathBuf;
use std::time::Duration;

use contracts::{topics, BusBackend, CameraSettings, DomainId, Verbosity};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// 默认标定文件路径
pub const DEFAULT_CALIBRATION_FILE: &str = "/etc/dashcam/camera_calibration.json";

/// 默认模块 ID
pub const DEFAULT_MODULE_ID: &str = "camera_interface";

/// 顶层配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DashcamConfig {
    /// 模块 ID (总线上的身份)
    #[validate(length(min = 1, max = 64))]
    pub module_id: String,

    /// 初始相机参数
    #[validate(nested)]
    pub camera: CameraSettings,

    /// 总线
    #[validate(nested)]
    pub dds: DdsConfig,

    /// 标定
    #[validate(nested)]
    pub calibration: CalibrationConfig,

    /// 运行期参数
    #[validate(nested)]
    pub runtime: RuntimeConfig,
}

impl Default for DashcamConfig {
    fn default() -> Self {
        Self {
            module_id: DEFAULT_MODULE_ID.to_string(),
            camera: CameraSettings::default(),
            dds: DdsConfig::default(),
            calibration: CalibrationConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

/// 总线配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DdsConfig {
    pub domain_id: DomainId,

    #[validate(length(min = 1))]
    pub image_topic: String,

    #[validate(length(min = 1))]
    pub control_topic: String,

    #[validate(length(min = 1))]
    pub status_topic: String,

    pub backend: BusBackend,
}

impl Default for DdsConfig {
    fn default() -> Self {
        Self {
            domain_id: 0,
            image_topic: topics::DEFAULT_IMAGE_TOPIC.to_string(),
            control_topic: topics::DEFAULT_CONTROL_TOPIC.to_string(),
            status_topic: topics::DEFAULT_STATUS_TOPIC.to_string(),
            backend: BusBackend::default(),
        }
    }
}

/// 标定文件配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CalibrationConfig {
    /// 启动时加载标定文件
    pub auto_load: bool,

    /// 标定文件路径 (.json / .toml)
    pub file: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            auto_load: true,
            file: PathBuf::from(DEFAULT_CALIBRATION_FILE),
        }
    }
}

/// 运行期参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RuntimeConfig {
    /// 初始日志级别，名称或 0..=4
    #[serde(deserialize_with = "verbosity_name_or_level")]
    pub verbosity: Verbosity,

    #[validate(range(min = 10))]
    pub heartbeat_interval_ms: u64,

    #[validate(range(min = 10))]
    pub status_interval_ms: u64,

    #[validate(range(min = 1))]
    pub join_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Info,
            heartbeat_interval_ms: 1000,
            status_interval_ms: 5000,
            join_timeout_ms: 5000,
        }
    }
}

impl RuntimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn verbosity_name_or_level<'de, D: Deserializer<'de>>(d: D) -> Result<Verbosity, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Level(u8),
        Name(String),
    }

    match Raw::deserialize(d)? {
        Raw::Level(level) if level <= 4 => Ok(Verbosity::from_level(level)),
        Raw::Level(level) => Err(D::Error::custom(format!(
            "verbosity level must be within 0..=4, got {level}"
        ))),
        Raw::Name(name) => Verbosity::parse(&name)
            .ok_or_else(|| D::Error::custom(format!("unknown verbosity '{name}'"))),
    }
}
