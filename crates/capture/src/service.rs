//! CaptureService - 相机采集服务
//!
//! 持有相机、参数快照、标定记录与采集线程句柄。
//!
//! ## 线程模型
//!
//! - 控制线程：`initialize` / `start` / `stop` / `update_settings` / `get_status`
//! - 采集线程：恰好一个 (见 [`crate::worker`])
//!
//! 共享状态：停止信号、参数快照 (整体替换)、FPS 原子计数。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    topics, CalibrationRecord, CameraSettings, ConfigMessage, Configurable, ContractError,
    Initializable, MergeReport, ModuleId, Resolution, Shutdownable, StatusReporting,
};
use module_runtime::{ConfigTable, ModuleContext, ModuleLogger};
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;
use validator::Validate;

use crate::worker::{CaptureCounters, CaptureLoop, CaptureMetrics, CaptureWorker, StopSignal};
use crate::{
    camera_settings_table, CameraDevice, FpsCounter, RemapUndistorter, SettingsCell, Undistorter,
};

/// 默认的线程退出等待时间
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// 采集服务选项
#[derive(Clone)]
pub struct CaptureOptions {
    /// 初始相机参数
    pub settings: CameraSettings,
    /// 标定记录 (加载后不可变)
    pub calibration: CalibrationRecord,
    /// 畸变校正器，None 使用 [`RemapUndistorter`]
    pub undistorter: Option<Arc<dyn Undistorter>>,
    /// 图像主题
    pub image_topic: String,
    /// `stop()` 等待采集线程退出的上限
    pub join_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            settings: CameraSettings::default(),
            calibration: CalibrationRecord::uncalibrated(),
            undistorter: None,
            image_topic: topics::DEFAULT_IMAGE_TOPIC.to_string(),
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

/// 状态快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureStatus {
    pub module_id: ModuleId,
    pub running: bool,
    pub fps: f64,
    pub frame_count_in_window: u64,
    pub resolution: Resolution,
    pub calibrated: bool,
    pub settings: CameraSettings,
}

/// 相机采集服务
pub struct CaptureService {
    ctx: ModuleContext,
    camera: Arc<dyn CameraDevice>,
    settings: Arc<SettingsCell>,
    settings_table: ConfigTable<CameraSettings>,
    settings_lock: Mutex<()>,
    calibration: Arc<CalibrationRecord>,
    undistorter: Arc<dyn Undistorter>,
    image_topic: String,
    join_timeout: Duration,
    fps: Arc<FpsCounter>,
    counters: Arc<CaptureCounters>,
    worker: Mutex<Option<CaptureWorker>>,
}

impl CaptureService {
    /// 创建服务 (不打开相机)
    ///
    /// 非法的标定记录按未标定处理，非法的初始参数回退为默认值，均记录 Warn。
    pub fn new(ctx: ModuleContext, camera: Arc<dyn CameraDevice>, options: CaptureOptions) -> Self {
        let logger = ctx.logger();

        let calibration = match options.calibration.validate() {
            Ok(()) => options.calibration,
            Err(e) => {
                logger.warn(format!("Invalid calibration, correction disabled: {e}"));
                CalibrationRecord::uncalibrated()
            }
        };

        let settings = match options.settings.validate() {
            Ok(()) => options.settings,
            Err(e) => {
                logger.warn(format!("Invalid camera settings, using defaults: {e}"));
                CameraSettings::default()
            }
        };

        let undistorter = options
            .undistorter
            .unwrap_or_else(|| Arc::new(RemapUndistorter::new()));

        Self {
            ctx,
            camera,
            settings: Arc::new(SettingsCell::new(settings)),
            settings_table: camera_settings_table(),
            settings_lock: Mutex::new(()),
            calibration: Arc::new(calibration),
            undistorter,
            image_topic: options.image_topic,
            join_timeout: options.join_timeout,
            fps: Arc::new(FpsCounter::new()),
            counters: Arc::new(CaptureCounters::default()),
            worker: Mutex::new(None),
        }
    }

    fn logger(&self) -> &ModuleLogger {
        self.ctx.logger()
    }

    fn worker(&self) -> MutexGuard<'_, Option<CaptureWorker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 以当前分辨率打开相机并下发参数
    ///
    /// 失败返回 `false`；已打开时直接返回 `true`。
    #[instrument(name = "capture_initialize", skip(self), fields(module_id = %self.ctx.module_id()))]
    pub fn initialize(&self) -> bool {
        if self.camera.is_open() {
            return true;
        }

        let settings = self.settings.snapshot();
        if let Err(e) = self.camera.open(settings.resolution) {
            self.logger()
                .error(format!("Failed to initialize camera: {e}"));
            return false;
        }
        if let Err(e) = self.camera.apply_settings(&settings) {
            self.logger()
                .warn(format!("Failed to apply camera settings: {e}"));
        }

        self.logger().info(format!(
            "Camera '{}' initialized at {} ({} fps, calibrated: {})",
            self.camera.name(),
            settings.resolution,
            settings.framerate,
            self.calibration.calibrated
        ));
        true
    }

    /// 启动采集线程
    ///
    /// 已在运行时返回 `true` 且不会创建第二个线程。上一次 `stop` 超时、
    /// 旧线程仍未退出时返回 `false`。相机尚未打开时先调用
    /// [`CaptureService::initialize`]；启动失败时释放相机。
    #[instrument(name = "capture_start", skip(self), fields(module_id = %self.ctx.module_id()))]
    pub fn start(&self) -> bool {
        let mut worker = self.worker();

        if let Some(existing) = worker.as_mut() {
            if !existing.is_finished() {
                if existing.stop_requested() {
                    self.logger()
                        .error("Previous capture thread has not exited, refusing to start");
                    return false;
                }
                self.logger().warn("Capture already running");
                return true;
            }
            // 回收已退出的线程
            if let Err(e) = existing.stop(Duration::ZERO) {
                self.logger().warn(format!("Stale capture thread: {e}"));
            }
        }
        *worker = None;

        if !self.initialize() {
            return false;
        }
        if let Err(e) = self.camera.start_streaming() {
            self.logger()
                .error(format!("Failed to start camera streaming: {e}"));
            self.camera.release();
            return false;
        }

        let capture = CaptureLoop {
            module_id: self.ctx.module_id().clone(),
            bus: self.ctx.bus().clone(),
            logger: self.logger().clone(),
            image_topic: self.image_topic.clone(),
            camera: self.camera.clone(),
            settings: self.settings.clone(),
            calibration: self.calibration.clone(),
            undistorter: self.undistorter.clone(),
            fps: self.fps.clone(),
            counters: self.counters.clone(),
            stop: Arc::new(StopSignal::new()),
        };

        match CaptureWorker::spawn(capture) {
            Ok(spawned) => {
                *worker = Some(spawned);
                self.logger().info(format!(
                    "Capture started, publishing on '{}'",
                    self.image_topic
                ));
                true
            }
            Err(e) => {
                self.logger().error(e.to_string());
                if let Err(e) = self.camera.stop_streaming() {
                    self.logger().warn(format!("Failed to stop streaming: {e}"));
                }
                self.camera.release();
                false
            }
        }
    }

    /// 停止采集线程并释放相机
    ///
    /// 等待不超过 join timeout；超时则强制释放相机并记录 Error，照常返回。
    /// 超时的线程句柄保留，线程退出前 `start` 会拒绝启动。
    /// 没有采集线程时只释放已打开的相机。
    #[instrument(name = "capture_stop", skip(self), fields(module_id = %self.ctx.module_id()))]
    pub fn stop(&self) {
        let mut worker = self.worker();
        let Some(running) = worker.as_mut() else {
            if self.camera.is_open() {
                self.camera.release();
                self.logger().info("Camera released");
            }
            return;
        };

        match running.stop(self.join_timeout) {
            Ok(()) => {
                *worker = None;
                if let Err(e) = self.camera.stop_streaming() {
                    self.logger().warn(format!("Failed to stop streaming: {e}"));
                }
                self.camera.release();
                self.logger().info("Capture stopped");
            }
            Err(e) => {
                self.camera.release();
                self.logger()
                    .error(format!("{e}; camera force-released"));
            }
        }
    }

    /// 采集线程是否在运行 (已请求停止的线程不算)
    pub fn is_running(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|w| !w.is_finished() && !w.stop_requested())
    }

    /// 采集线程在未请求停止的情况下退出 (panic)
    pub fn loop_exited_unexpectedly(&self) -> bool {
        self.worker()
            .as_ref()
            .is_some_and(|w| w.is_finished() && !w.stop_requested())
    }

    /// 更新相机参数并记录结果
    ///
    /// 每个字段单独校验；合法字段作为一个整体快照生效并下发到硬件，
    /// 非法字段与未知字段跳过并记录 Warn。不会重启采集线程。
    pub fn update_settings(&self, update: &ConfigMessage) -> MergeReport {
        let report = self.merge_settings(update);
        let logger = self.logger();

        for key in &report.unknown {
            logger.warn(format!("Unknown camera setting '{key}' ignored"));
        }
        for rejection in &report.rejected {
            logger.warn(format!(
                "Invalid value for camera setting '{}': {}",
                rejection.key, rejection.reason
            ));
        }
        if report.has_changes() {
            logger.info(format!(
                "Updated camera settings: {}",
                report.applied.join(", ")
            ));
        }
        report
    }

    /// 合并参数，不记录日志 (由调用方记录)
    fn merge_settings(&self, update: &ConfigMessage) -> MergeReport {
        let _guard = self
            .settings_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let current = self.settings.snapshot();
        let (staged, mut report) = self.settings_table.stage(&current, update);
        if !report.has_changes() {
            return report;
        }

        if let Err(e) = staged.validate() {
            let applied = std::mem::take(&mut report.applied);
            for key in applied {
                report.rejected(key, e.to_string());
            }
            return report;
        }

        self.settings.replace(staged.clone());
        if self.camera.is_open() {
            if let Err(e) = self.camera.apply_settings(&staged) {
                self.logger()
                    .warn(format!("Failed to apply settings to camera: {e}"));
            }
        }
        report
    }

    /// 状态快照
    pub fn get_status(&self) -> CaptureStatus {
        let settings = self.settings.snapshot();
        CaptureStatus {
            module_id: self.ctx.module_id().clone(),
            running: self.is_running(),
            fps: self.fps.fps(),
            frame_count_in_window: self.fps.frames_in_window(),
            resolution: settings.resolution,
            calibrated: self.calibration.calibrated,
            settings: (*settings).clone(),
        }
    }

    /// 累计计数
    pub fn capture_metrics(&self) -> CaptureMetrics {
        self.counters.snapshot()
    }

    /// 当前参数
    pub fn settings(&self) -> Arc<CameraSettings> {
        self.settings.snapshot()
    }

    pub fn calibration(&self) -> &CalibrationRecord {
        &self.calibration
    }

    pub fn image_topic(&self) -> &str {
        &self.image_topic
    }
}

impl Drop for CaptureService {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Initializable for CaptureService {
    fn init_module(&self) -> Result<(), ContractError> {
        if !self.initialize() {
            return Err(ContractError::camera_unavailable(format!(
                "camera '{}' could not be opened",
                self.camera.name()
            )));
        }
        if !self.start() {
            return Err(ContractError::camera("capture loop failed to start"));
        }
        Ok(())
    }
}

impl Shutdownable for CaptureService {
    fn shutdown_module(&self) -> Result<(), ContractError> {
        self.stop();
        Ok(())
    }
}

impl StatusReporting for CaptureService {
    fn status(&self) -> Value {
        serde_json::to_value(self.get_status()).unwrap_or_default()
    }

    fn metrics(&self) -> Value {
        serde_json::to_value(self.capture_metrics()).unwrap_or_default()
    }
}

impl Configurable for CaptureService {
    fn config_keys(&self) -> Vec<&'static str> {
        self.settings_table.keys()
    }

    fn merge_config(&self, update: &ConfigMessage) -> MergeReport {
        self.merge_settings(update)
    }
}
