//! CameraDevice trait - 相机驱动抽象
//!
//! 采集服务只通过这个接口访问硬件。实现需要内部可变性，
//! 因为采集线程与控制线程会同时持有同一个设备。

use contracts::{CameraSettings, ContractError, ImageFrame, Resolution};

/// 相机设备
pub trait CameraDevice: Send + Sync {
    /// 设备名称 (日志用)
    fn name(&self) -> &str;

    /// 以指定分辨率打开设备
    ///
    /// # Errors
    /// 设备不存在或被占用时返回 `ContractError::CameraUnavailable`。
    fn open(&self, resolution: Resolution) -> Result<(), ContractError>;

    /// 是否已打开
    fn is_open(&self) -> bool;

    /// 将参数下发到硬件
    fn apply_settings(&self, settings: &CameraSettings) -> Result<(), ContractError>;

    /// 开始出流
    fn start_streaming(&self) -> Result<(), ContractError>;

    /// 停止出流 (设备保持打开)
    fn stop_streaming(&self) -> Result<(), ContractError>;

    /// 采集一帧
    ///
    /// `Ok(None)` 表示本次没有帧，调用方按节奏重试。
    fn capture(&self) -> Result<Option<ImageFrame>, ContractError>;

    /// 释放设备；可重复调用，也可能从非采集线程调用
    fn release(&self);
}
