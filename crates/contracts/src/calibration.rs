//! CalibrationRecord - lens correction parameters
//!
//! Loaded once at initialization; immutable for the life of the process.

use serde::{Deserialize, Serialize};

use crate::ContractError;

/// Row-major 3×3 matrix
pub type Matrix3 = [[f64; 3]; 3];

/// 3×3 identity
pub const IDENTITY_MATRIX: Matrix3 = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Distortion coefficient counts accepted (OpenCV layouts)
pub const DISTORTION_COEFF_COUNTS: [usize; 5] = [4, 5, 8, 12, 14];

/// Valid region after undistortion, serialized as `[x, y, w, h]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<[u32; 4]> for Roi {
    fn from([x, y, width, height]: [u32; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl From<Roi> for [u32; 4] {
    fn from(r: Roi) -> Self {
        [r.x, r.y, r.width, r.height]
    }
}

/// Camera calibration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Intrinsic matrix K
    pub camera_matrix: Matrix3,

    /// k1, k2, p1, p2[, k3, ...]
    pub distortion_coeffs: Vec<f64>,

    /// Refined intrinsic matrix used for the corrected image
    pub optimal_camera_matrix: Matrix3,

    /// Valid pixel region
    pub roi: Roi,

    /// Whether correction should be applied
    pub calibrated: bool,
}

impl Default for CalibrationRecord {
    fn default() -> Self {
        Self::uncalibrated()
    }
}

impl CalibrationRecord {
    /// Record that disables correction
    pub fn uncalibrated() -> Self {
        Self {
            camera_matrix: IDENTITY_MATRIX,
            distortion_coeffs: Vec::new(),
            optimal_camera_matrix: IDENTITY_MATRIX,
            roi: Roi::default(),
            calibrated: false,
        }
    }

    /// Calibrated record whose correction is a no-op
    pub fn identity(width: u32, height: u32) -> Self {
        Self {
            camera_matrix: IDENTITY_MATRIX,
            distortion_coeffs: vec![0.0; 5],
            optimal_camera_matrix: IDENTITY_MATRIX,
            roi: Roi {
                x: 0,
                y: 0,
                width,
                height,
            },
            calibrated: true,
        }
    }

    /// Check shapes and values
    ///
    /// Uncalibrated records are always valid.
    pub fn validate(&self) -> Result<(), ContractError> {
        if !self.calibrated {
            return Ok(());
        }

        if !DISTORTION_COEFF_COUNTS.contains(&self.distortion_coeffs.len()) {
            return Err(ContractError::invalid_calibration(format!(
                "distortion_coeffs must have one of {:?} entries, got {}",
                DISTORTION_COEFF_COUNTS,
                self.distortion_coeffs.len()
            )));
        }

        for (name, m) in [
            ("camera_matrix", &self.camera_matrix),
            ("optimal_camera_matrix", &self.optimal_camera_matrix),
        ] {
            if m.iter().flatten().any(|v| !v.is_finite()) {
                return Err(ContractError::invalid_calibration(format!(
                    "{name} contains non-finite values"
                )));
            }
            if m[0][0] == 0.0 || m[1][1] == 0.0 {
                return Err(ContractError::invalid_calibration(format!(
                    "{name} has a zero focal length"
                )));
            }
        }

        if self.distortion_coeffs.iter().any(|v| !v.is_finite()) {
            return Err(ContractError::invalid_calibration(
                "distortion_coeffs contains non-finite values",
            ));
        }

        Ok(())
    }
}
