//! 图像帧与帧元数据
//!
//! Capture Service 输出：`ImageMessage = (像素数据, FrameMetadata)`。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ModuleId;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    #[default]
    Bgr8,
    Rgb8,
    Bgra8,
    Gray8,
}

impl PixelFormat {
    /// 每像素通道数
    pub fn channels(self) -> u8 {
        match self {
            Self::Bgr8 | Self::Rgb8 => 3,
            Self::Bgra8 => 4,
            Self::Gray8 => 1,
        }
    }
}

/// 原始图像帧 (相机输出)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: PixelFormat,

    /// 行优先、紧密排列的像素数据 (零拷贝)
    pub data: Bytes,
}

impl ImageFrame {
    /// 通道数
    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    /// 期望的数据长度
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels() as usize
    }

    /// 数据长度是否与尺寸一致
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.expected_len()
    }
}

/// 帧元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// 采集时刻 (微秒, epoch)，不是发布时刻
    pub timestamp_micros: i64,

    /// 单次采集循环内严格递增，循环启动时归零
    pub sequence_id: u64,

    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 通道数
    pub channels: u8,

    /// 像素格式
    pub pixel_format: PixelFormat,

    /// 来源模块
    pub source_module: ModuleId,
}

impl FrameMetadata {
    /// 从图像帧构建元数据
    pub fn for_frame(
        frame: &ImageFrame,
        sequence_id: u64,
        timestamp_micros: i64,
        source_module: ModuleId,
    ) -> Self {
        Self {
            timestamp_micros,
            sequence_id,
            width: frame.width,
            height: frame.height,
            channels: frame.channels(),
            pixel_format: frame.format,
            source_module,
        }
    }
}

/// 图像主题上的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMessage {
    /// 帧元数据
    pub metadata: FrameMetadata,

    /// 像素数据
    pub data: Bytes,
}
