//! CameraSettings - 相机参数
//!
//! 仅由 Capture Service 持有；只能通过配置注入路径更新。
//! 取值范围见 [`limits`]，derive 校验与运行期 setter 表共用同一组边界。

use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// 参数边界
pub mod limits {
    pub const MIN_FRAMERATE: u32 = 1;
    pub const MAX_FRAMERATE: u32 = 240;
    pub const MAX_ISO: u32 = 3200;
    pub const MIN_BRIGHTNESS: i32 = 0;
    pub const MAX_BRIGHTNESS: i32 = 100;
    /// contrast / saturation / sharpness
    pub const MIN_ADJUST: i32 = -100;
    pub const MAX_ADJUST: i32 = 100;
    pub const MAX_DIGITAL_GAIN: f64 = 16.0;
    pub const ROTATIONS: [u16; 4] = [0, 90, 180, 270];
    pub const MAX_DIMENSION: u32 = 8192;
}

/// 分辨率，序列化为 `[width, height]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Resolution {
    #[validate(range(min = 1, max = 8192))]
    pub width: u32,
    #[validate(range(min = 1, max = 8192))]
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 像素总数
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl From<[u32; 2]> for Resolution {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<Resolution> for [u32; 2] {
    fn from(r: Resolution) -> Self {
        [r.width, r.height]
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// 曝光模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureMode {
    #[default]
    Auto,
    Normal,
    Short,
    Long,
    Custom,
}

/// 白平衡
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhiteBalance {
    #[default]
    Auto,
    Incandescent,
    Tungsten,
    Fluorescent,
    Indoor,
    Daylight,
    Cloudy,
    Custom,
}

/// 相机参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CameraSettings {
    /// 分辨率 (width, height > 0)
    #[validate(nested)]
    pub resolution: Resolution,

    /// 帧率 (frames/sec)
    #[validate(range(min = 1, max = 240))]
    pub framerate: u32,

    /// 曝光模式
    pub exposure_mode: ExposureMode,

    /// 白平衡
    pub white_balance: WhiteBalance,

    /// ISO，0 = auto
    #[validate(range(max = 3200))]
    pub iso: u32,

    /// 亮度
    #[validate(range(min = 0, max = 100))]
    pub brightness: i32,

    /// 对比度
    #[validate(range(min = -100, max = 100))]
    pub contrast: i32,

    /// 饱和度
    #[validate(range(min = -100, max = 100))]
    pub saturation: i32,

    /// 锐度
    #[validate(range(min = -100, max = 100))]
    pub sharpness: i32,

    /// 数字增益
    #[validate(range(min = 0.0, max = 16.0))]
    pub digital_gain: f64,

    /// 旋转角度 (0/90/180/270)
    #[validate(custom(function = "validate_rotation"))]
    pub rotation: u16,

    /// 水平翻转
    pub hflip: bool,

    /// 垂直翻转
    pub vflip: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::new(1920, 1080),
            framerate: 30,
            exposure_mode: ExposureMode::Auto,
            white_balance: WhiteBalance::Auto,
            iso: 0,
            brightness: 50,
            contrast: 0,
            saturation: 0,
            sharpness: 0,
            digital_gain: 1.0,
            rotation: 0,
            hflip: false,
            vflip: false,
        }
    }
}

impl CameraSettings {
    /// 目标帧间隔 (秒)
    pub fn frame_interval_secs(&self) -> f64 {
        1.0 / self.framerate.max(limits::MIN_FRAMERATE) as f64
    }
}

fn validate_rotation(rotation: u16) -> Result<(), ValidationError> {
    if limits::ROTATIONS.contains(&rotation) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_rotation");
        err.message = Some(format!("rotation must be one of 0/90/180/270, got {rotation}").into());
        Err(err)
    }
}
