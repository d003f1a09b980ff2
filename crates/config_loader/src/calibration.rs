//! Calibration file IO
//!
//! File layout (JSON or TOML, picked by extension):
//!
//! ```json
//! {
//!   "camera_matrix": [[fx, 0, cx], [0, fy, cy], [0, 0, 1]],
//!   "distortion_coeffs": [k1, k2, p1, p2, k3],
//!   "optimal_camera_matrix": [[...], [...], [...]],
//!   "roi": [x, y, w, h]
//! }
//! ```
//!
//! `distortion_coeffs` may also be OpenCV's nested `[[k1, k2, p1, p2, k3]]`.

use std::path::Path;

use contracts::{CalibrationRecord, ContractError, Matrix3, Roi};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{parser, CalibrationConfig, ConfigFormat, ConfigLoader};

#[derive(Deserialize)]
#[serde(untagged)]
enum Coefficients {
    Flat(Vec<f64>),
    Nested(Vec<Vec<f64>>),
}

impl Coefficients {
    fn flatten(self) -> Vec<f64> {
        match self {
            Self::Flat(coeffs) => coeffs,
            Self::Nested(rows) => rows.into_iter().flatten().collect(),
        }
    }
}

#[derive(Deserialize)]
struct CalibrationFile {
    camera_matrix: Matrix3,
    distortion_coeffs: Coefficients,
    optimal_camera_matrix: Matrix3,
    roi: Roi,
}

#[derive(Serialize)]
struct CalibrationFileRef<'a> {
    camera_matrix: &'a Matrix3,
    distortion_coeffs: &'a [f64],
    optimal_camera_matrix: &'a Matrix3,
    roi: &'a Roi,
}

/// Load and validate a calibration file
///
/// # Errors
/// Unreadable file, unsupported extension, parse failure or bad shapes.
pub fn load_calibration(path: &Path) -> Result<CalibrationRecord, ContractError> {
    let format = ConfigLoader::detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    let file: CalibrationFile = parser::parse(&content, format)?;

    let record = CalibrationRecord {
        camera_matrix: file.camera_matrix,
        distortion_coeffs: file.distortion_coeffs.flatten(),
        optimal_camera_matrix: file.optimal_camera_matrix,
        roi: file.roi,
        calibrated: true,
    };
    record.validate()?;
    Ok(record)
}

/// Calibration for startup
///
/// Anything other than a valid file yields an uncalibrated record, logged
/// as a warning.
pub fn resolve_calibration(config: &CalibrationConfig) -> CalibrationRecord {
    if !config.auto_load {
        return CalibrationRecord::uncalibrated();
    }

    match load_calibration(&config.file) {
        Ok(record) => {
            info!(file = %config.file.display(), "Camera calibration loaded");
            record
        }
        Err(e) => {
            warn!(file = %config.file.display(), error = %e, "Failed to load calibration");
            CalibrationRecord::uncalibrated()
        }
    }
}

/// Write a calibrated record
///
/// # Errors
/// Uncalibrated or invalid record, unsupported extension, IO failure.
pub fn save_calibration(path: &Path, record: &CalibrationRecord) -> Result<(), ContractError> {
    if !record.calibrated {
        return Err(ContractError::invalid_calibration(
            "refusing to save an uncalibrated record",
        ));
    }
    record.validate()?;

    let file = CalibrationFileRef {
        camera_matrix: &record.camera_matrix,
        distortion_coeffs: &record.distortion_coeffs,
        optimal_camera_matrix: &record.optimal_camera_matrix,
        roi: &record.roi,
    };
    let content = match ConfigLoader::detect_format(path)? {
        ConfigFormat::Toml => toml::to_string_pretty(&file)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))?,
        ConfigFormat::Json => serde_json::to_string_pretty(&file)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))?,
    };
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const OPENCV_JSON: &str = r#"{
        "camera_matrix": [[1000.0, 0.0, 960.0], [0.0, 1000.0, 540.0], [0.0, 0.0, 1.0]],
        "distortion_coeffs": [[-0.28, 0.07, 0.0005, -0.0002, 0.0]],
        "optimal_camera_matrix": [[900.0, 0.0, 955.0], [0.0, 900.0, 538.0], [0.0, 0.0, 1.0]],
        "roi": [12, 8, 1890, 1060]
    }"#;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_nested_coefficients() {
        let dir = tempfile::tempdir().unwrap();
        let record = load_calibration(&write(&dir, "calib.json", OPENCV_JSON)).unwrap();
        assert!(record.calibrated);
        assert_eq!(record.distortion_coeffs.len(), 5);
        assert_eq!(record.roi.width, 1890);
    }

    #[test]
    fn test_bad_shape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let content = OPENCV_JSON.replace("[[-0.28, 0.07, 0.0005, -0.0002, 0.0]]", "[0.1, 0.2]");
        let err = load_calibration(&write(&dir, "calib.json", &content)).unwrap_err();
        assert!(matches!(err, ContractError::InvalidCalibration { .. }));
    }

    #[test]
    fn test_resolve_missing_file_is_uncalibrated() {
        let dir = tempfile::tempdir().unwrap();
        let config = CalibrationConfig {
            auto_load: true,
            file: dir.path().join("missing.json"),
        };
        assert!(!resolve_calibration(&config).calibrated);
    }

    #[test]
    fn test_resolve_respects_auto_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = CalibrationConfig {
            auto_load: false,
            file: write(&dir, "calib.json", OPENCV_JSON),
        };
        assert!(!resolve_calibration(&config).calibrated);
    }

    #[test]
    fn test_save_then_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let original = load_calibration(&write(&dir, "calib.json", OPENCV_JSON)).unwrap();

        let path = dir.path().join("calib.toml");
        save_calibration(&path, &original).unwrap();
        assert_eq!(load_calibration(&path).unwrap(), original);
    }

    #[test]
    fn test_save_uncalibrated_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = save_calibration(
            &dir.path().join("calib.json"),
            &CalibrationRecord::uncalibrated(),
        );
        assert!(result.is_err());
    }
}
