//! 相机参数的运行期更新
//!
//! - [`camera_settings_table`]: 远程可修改的键及其 setter
//! - [`SettingsCell`]: 整体替换的参数快照，采集线程每次迭代读取一份

use std::sync::{Arc, PoisonError, RwLock};

use contracts::{limits, CameraSettings, Resolution};
use module_runtime::config_table::{boolean, float_in_range, int_in_range, parse};
use module_runtime::ConfigTable;

/// CameraSettings 的键表
pub fn camera_settings_table() -> ConfigTable<CameraSettings> {
    ConfigTable::<CameraSettings>::new()
        .with("resolution", |s, v| {
            let [width, height] = parse::<[u32; 2]>(v)?;
            let max = limits::MAX_DIMENSION;
            if !(1..=max).contains(&width) || !(1..=max).contains(&height) {
                return Err(format!("resolution must be within 1..={max}, got {width}x{height}"));
            }
            s.resolution = Resolution::new(width, height);
            Ok(())
        })
        .with("framerate", |s, v| {
            s.framerate = int_in_range(
                v,
                limits::MIN_FRAMERATE as i64,
                limits::MAX_FRAMERATE as i64,
            )? as u32;
            Ok(())
        })
        .with("exposure_mode", |s, v| {
            s.exposure_mode = parse(v)?;
            Ok(())
        })
        .with("white_balance", |s, v| {
            s.white_balance = parse(v)?;
            Ok(())
        })
        .with("iso", |s, v| {
            s.iso = int_in_range(v, 0, limits::MAX_ISO as i64)? as u32;
            Ok(())
        })
        .with("brightness", |s, v| {
            s.brightness = int_in_range(
                v,
                limits::MIN_BRIGHTNESS as i64,
                limits::MAX_BRIGHTNESS as i64,
            )? as i32;
            Ok(())
        })
        .with("contrast", |s, v| {
            s.contrast = adjust(v)?;
            Ok(())
        })
        .with("saturation", |s, v| {
            s.saturation = adjust(v)?;
            Ok(())
        })
        .with("sharpness", |s, v| {
            s.sharpness = adjust(v)?;
            Ok(())
        })
        .with("digital_gain", |s, v| {
            s.digital_gain = float_in_range(v, 0.0, limits::MAX_DIGITAL_GAIN)?;
            Ok(())
        })
        .with("rotation", |s, v| {
            let rotation = int_in_range(v, 0, 270)? as u16;
            if !limits::ROTATIONS.contains(&rotation) {
                return Err(format!("rotation must be one of 0/90/180/270, got {rotation}"));
            }
            s.rotation = rotation;
            Ok(())
        })
        .with("hflip", |s, v| {
            s.hflip = boolean(v)?;
            Ok(())
        })
        .with("vflip", |s, v| {
            s.vflip = boolean(v)?;
            Ok(())
        })
}

fn adjust(v: &serde_json::Value) -> Result<i32, String> {
    Ok(int_in_range(v, limits::MIN_ADJUST as i64, limits::MAX_ADJUST as i64)? as i32)
}

/// 参数快照
///
/// 读者拿到 `Arc` 后不再持锁；写者整体替换，不存在半更新状态。
#[derive(Debug)]
pub struct SettingsCell {
    current: RwLock<Arc<CameraSettings>>,
}

impl SettingsCell {
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// 当前快照
    pub fn snapshot(&self) -> Arc<CameraSettings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 整体替换
    pub fn replace(&self, settings: CameraSettings) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
    }
}
