//! Undistorter - 镜头畸变校正
//!
//! 采集循环只在 `calibrated == true` 时调用。默认实现 [`RemapUndistorter`]
//! 使用 pinhole + Brown–Conrady 模型 (k1, k2, p1, p2, k3) 计算映射表，
//! 最近邻采样；映射表按帧尺寸与标定记录缓存，只在其变化时重建。

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use contracts::{CalibrationRecord, ContractError, ImageFrame, Matrix3};
use nalgebra::{Matrix3 as NMatrix3, Vector3};
use tracing::debug;

/// 畸变校正器
pub trait Undistorter: Send + Sync {
    /// 返回校正后的帧 (尺寸与格式不变)
    fn undistort(
        &self,
        frame: &ImageFrame,
        calibration: &CalibrationRecord,
    ) -> Result<ImageFrame, ContractError>;
}

/// 原样返回
#[derive(Debug, Clone, Copy, Default)]
pub struct NullUndistorter;

impl Undistorter for NullUndistorter {
    fn undistort(
        &self,
        frame: &ImageFrame,
        _calibration: &CalibrationRecord,
    ) -> Result<ImageFrame, ContractError> {
        Ok(frame.clone())
    }
}

/// 目标像素 → 源像素下标 (越界为 None，输出黑色)
struct RemapTable {
    width: u32,
    height: u32,
    calibration: CalibrationRecord,
    map: Arc<Vec<Option<usize>>>,
}

/// 基于映射表的畸变校正
#[derive(Default)]
pub struct RemapUndistorter {
    cache: Mutex<Option<RemapTable>>,
}

impl RemapUndistorter {
    pub fn new() -> Self {
        Self::default()
    }

    fn to_matrix(m: &Matrix3) -> NMatrix3<f64> {
        NMatrix3::new(
            m[0][0], m[0][1], m[0][2], //
            m[1][0], m[1][1], m[1][2], //
            m[2][0], m[2][1], m[2][2],
        )
    }

    /// 计算映射表
    fn build_map(
        width: u32,
        height: u32,
        calibration: &CalibrationRecord,
    ) -> Result<Vec<Option<usize>>, ContractError> {
        let camera = Self::to_matrix(&calibration.camera_matrix);
        let optimal_inv = Self::to_matrix(&calibration.optimal_camera_matrix)
            .try_inverse()
            .ok_or_else(|| ContractError::undistort("optimal_camera_matrix is singular"))?;

        let coeff = |i: usize| calibration.distortion_coeffs.get(i).copied().unwrap_or(0.0);
        let (k1, k2, p1, p2, k3) = (coeff(0), coeff(1), coeff(2), coeff(3), coeff(4));

        let (w, h) = (width as usize, height as usize);
        let mut map = Vec::with_capacity(w * h);
        for v in 0..h {
            for u in 0..w {
                // 目标像素 → 归一化平面
                let ray = optimal_inv * Vector3::new(u as f64, v as f64, 1.0);
                let (x, y) = (ray.x / ray.z, ray.y / ray.z);

                // 施加畸变
                let r2 = x * x + y * y;
                let radial = 1.0 + k1 * r2 + k2 * r2 * r2 + k3 * r2 * r2 * r2;
                let xd = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
                let yd = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

                // 投影回源图像
                let src = camera * Vector3::new(xd, yd, 1.0);
                let (sx, sy) = ((src.x / src.z).round(), (src.y / src.z).round());

                let inside = sx.is_finite()
                    && sy.is_finite()
                    && sx >= 0.0
                    && sy >= 0.0
                    && sx < width as f64
                    && sy < height as f64;
                map.push(inside.then(|| sy as usize * w + sx as usize));
            }
        }
        Ok(map)
    }

    fn map_for(
        &self,
        width: u32,
        height: u32,
        calibration: &CalibrationRecord,
    ) -> Result<Arc<Vec<Option<usize>>>, ContractError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(table) = cache.as_ref() {
            if table.width == width && table.height == height && &table.calibration == calibration
            {
                return Ok(table.map.clone());
            }
        }

        debug!(width, height, "building undistort map");
        let map = Arc::new(Self::build_map(width, height, calibration)?);
        *cache = Some(RemapTable {
            width,
            height,
            calibration: calibration.clone(),
            map: map.clone(),
        });
        Ok(map)
    }
}

impl Undistorter for RemapUndistorter {
    fn undistort(
        &self,
        frame: &ImageFrame,
        calibration: &CalibrationRecord,
    ) -> Result<ImageFrame, ContractError> {
        if !frame.is_consistent() {
            return Err(ContractError::undistort(format!(
                "frame data is {} bytes, expected {}",
                frame.data.len(),
                frame.expected_len()
            )));
        }
        calibration
            .validate()
            .map_err(|e| ContractError::undistort(e.to_string()))?;

        let map = self.map_for(frame.width, frame.height, calibration)?;
        let channels = frame.channels() as usize;
        let src = frame.data.as_ref();

        let mut out = vec![0u8; src.len()];
        for (dst_idx, src_idx) in map.iter().enumerate() {
            if let Some(src_idx) = src_idx {
                let (d, s) = (dst_idx * channels, src_idx * channels);
                out[d..d + channels].copy_from_slice(&src[s..s + channels]);
            }
        }

        Ok(ImageFrame {
            width: frame.width,
            height: frame.height,
            format: frame.format,
            data: Bytes::from(out),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PixelFormat, Roi};

    fn frame(width: u32, height: u32) -> ImageFrame {
        let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        ImageFrame {
            width,
            height,
            format: PixelFormat::Bgr8,
            data: Bytes::from(data),
        }
    }

    fn pinhole(width: u32, height: u32, k1: f64) -> CalibrationRecord {
        let k = [
            [50.0, 0.0, width as f64 / 2.0],
            [0.0, 50.0, height as f64 / 2.0],
            [0.0, 0.0, 1.0],
        ];
        CalibrationRecord {
            camera_matrix: k,
            distortion_coeffs: vec![k1, 0.0, 0.0, 0.0, 0.0],
            optimal_camera_matrix: k,
            roi: Roi {
                x: 0,
                y: 0,
                width,
                height,
            },
            calibrated: true,
        }
    }

    #[test]
    fn test_identity_calibration_preserves_pixels() {
        let input = frame(16, 9);
        let output = RemapUndistorter::new()
            .undistort(&input, &CalibrationRecord::identity(16, 9))
            .unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_zero_distortion_pinhole_preserves_pixels() {
        let input = frame(20, 10);
        let output = RemapUndistorter::new()
            .undistort(&input, &pinhole(20, 10, 0.0))
            .unwrap();
        assert_eq!(output.data, input.data);
    }

    #[test]
    fn test_barrel_distortion_changes_corners_not_centre() {
        let input = frame(40, 30);
        let output = RemapUndistorter::new()
            .undistort(&input, &pinhole(40, 30, -0.3))
            .unwrap();

        let px = |f: &ImageFrame, x: usize, y: usize| {
            let i = (y * 40 + x) * 3;
            f.data[i..i + 3].to_vec()
        };
        assert_eq!(px(&output, 20, 15), px(&input, 20, 15));
        assert_ne!(px(&output, 1, 1), px(&input, 1, 1));
        assert_eq!(output.data.len(), input.data.len());
    }

    #[test]
    fn test_inconsistent_frame_is_error() {
        let mut input = frame(4, 4);
        input.data = Bytes::from_static(&[0u8; 5]);
        let err = RemapUndistorter::new()
            .undistort(&input, &CalibrationRecord::identity(4, 4))
            .unwrap_err();
        assert!(matches!(err, ContractError::Undistort { .. }));
    }

    #[test]
    fn test_map_is_cached_per_size() {
        let undistorter = RemapUndistorter::new();
        let calibration = pinhole(8, 8, 0.1);
        let a = undistorter.map_for(8, 8, &calibration).unwrap();
        let b = undistorter.map_for(8, 8, &calibration).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let c = undistorter.map_for(4, 4, &calibration).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_null_undistorter() {
        let input = frame(3, 3);
        let output = NullUndistorter
            .undistort(&input, &CalibrationRecord::uncalibrated())
            .unwrap();
        assert_eq!(output, input);
    }
}
