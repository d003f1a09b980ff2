//! CameraModule - 挂载在 module runtime 上的采集服务
//!
//! 两条参数更新路径共用 [`CaptureService`] 的合并逻辑：
//! - `/<module_id>/config`: 由 runtime 分发 (含 `verbosity`)
//! - 控制主题 (默认 `camera/control`): 直接调用 `update_settings`

use std::sync::{Arc, Weak};

use contracts::{
    topics, BusConnector, BusMessage, ConfigMessage, MergeReport, ModuleIdentity, ModuleState,
    SubscriptionId,
};
use module_runtime::{ModuleContext, ModuleParams, ModuleRuntime};
use tracing::{debug, instrument, warn};

use crate::{CameraDevice, CaptureOptions, CaptureService, CaptureStatus, Result};

/// CameraModule 选项
#[derive(Clone)]
pub struct CameraModuleOptions {
    pub capture: CaptureOptions,
    pub control_topic: String,
    pub status_topic: String,
}

impl Default for CameraModuleOptions {
    fn default() -> Self {
        Self {
            capture: CaptureOptions::default(),
            control_topic: topics::DEFAULT_CONTROL_TOPIC.to_string(),
            status_topic: topics::DEFAULT_STATUS_TOPIC.to_string(),
        }
    }
}

/// 相机模块
pub struct CameraModule {
    runtime: ModuleRuntime,
    service: Arc<CaptureService>,
    status_topic: String,
    control_subscription: SubscriptionId,
}

impl CameraModule {
    /// 连接总线并挂载
    ///
    /// # Errors
    /// 总线域不可达时失败 (致命)。
    pub fn connect(
        params: ModuleParams,
        connector: &dyn BusConnector,
        camera: Arc<dyn CameraDevice>,
        options: CameraModuleOptions,
    ) -> Result<Self> {
        let ctx = ModuleContext::connect(params, connector)?;
        Self::new(ctx, camera, options)
    }

    /// 在已有上下文上挂载
    #[instrument(name = "camera_module_new", skip_all, fields(module_id = %ctx.module_id()))]
    pub fn new(
        ctx: ModuleContext,
        camera: Arc<dyn CameraDevice>,
        options: CameraModuleOptions,
    ) -> Result<Self> {
        let service = Arc::new(CaptureService::new(ctx.clone(), camera, options.capture));

        let weak: Weak<CaptureService> = Arc::downgrade(&service);
        let control_subscription = ctx.bus().subscribe(
            &options.control_topic,
            Arc::new(move |msg: &BusMessage| {
                let Some(service) = weak.upgrade() else {
                    return;
                };
                match msg {
                    BusMessage::Config(update) => {
                        service.update_settings(update);
                    }
                    other => debug!(kind = other.kind(), "Ignoring payload on control topic"),
                }
            }),
        )?;

        let runtime = match ModuleRuntime::mount(ctx.clone(), service.clone()) {
            Ok(runtime) => runtime,
            Err(e) => {
                ctx.bus().unsubscribe(control_subscription);
                return Err(e.into());
            }
        };

        ctx.logger().debug(format!(
            "Listening for camera settings on {}",
            options.control_topic
        ));

        Ok(Self {
            runtime,
            service,
            status_topic: options.status_topic,
            control_subscription,
        })
    }

    /// 打开相机，不启动采集
    pub fn initialize(&self) -> bool {
        self.service.initialize()
    }

    /// `Starting -> Running`：打开相机并启动采集线程
    pub fn start(&self) -> Result<()> {
        Ok(self.runtime.start()?)
    }

    /// 停止采集并释放相机
    pub fn stop(&self) -> Result<()> {
        Ok(self.runtime.stop()?)
    }

    /// 发布心跳
    ///
    /// 采集线程意外退出时先将模块置为 `Error`。
    pub fn tick(&self) -> Result<()> {
        if self.runtime.state() == ModuleState::Running && self.service.loop_exited_unexpectedly()
        {
            self.runtime.fault("capture thread exited unexpectedly");
        }
        Ok(self.runtime.tick()?)
    }

    /// 在状态主题上发布状态快照
    pub fn publish_status(&self) -> Result<()> {
        Ok(self.runtime.publish_status(&self.status_topic)?)
    }

    /// 更新相机参数 (与控制主题相同路径)
    pub fn update_settings(&self, update: &ConfigMessage) -> MergeReport {
        self.service.update_settings(update)
    }

    pub fn get_status(&self) -> CaptureStatus {
        self.service.get_status()
    }

    pub fn state(&self) -> ModuleState {
        self.runtime.state()
    }

    pub fn identity(&self) -> &ModuleIdentity {
        self.runtime.identity()
    }

    pub fn runtime(&self) -> &ModuleRuntime {
        &self.runtime
    }

    pub fn service(&self) -> &Arc<CaptureService> {
        &self.service
    }
}

impl Drop for CameraModule {
    fn drop(&mut self) {
        self.runtime
            .context()
            .bus()
            .unsubscribe(self.control_subscription);
        if let Err(e) = self.runtime.stop() {
            warn!(error = %e, "camera module did not stop cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    use bus::{subscribe_channel, InMemoryConnector};
    use contracts::{LogLevel, MessageBus, Resolution};
    use serde_json::json;

    use crate::{MockCamera, MockCameraConfig};

    fn options(framerate: u32) -> CameraModuleOptions {
        let mut options = CameraModuleOptions::default();
        options.capture.settings.resolution = Resolution::new(8, 4);
        options.capture.settings.framerate = framerate;
        options
    }

    fn module(connector: &InMemoryConnector, framerate: u32) -> (CameraModule, Arc<MockCamera>) {
        let camera = Arc::new(MockCamera::with_defaults());
        let module = CameraModule::connect(
            ModuleParams::new("camera_interface", 3),
            connector,
            camera.clone(),
            options(framerate),
        )
        .unwrap();
        (module, camera)
    }

    fn config(pairs: &[(&str, serde_json::Value)]) -> BusMessage {
        BusMessage::Config(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_unreachable_domain_is_fatal() {
        let connector = InMemoryConnector::new();
        let result = CameraModule::connect(
            ModuleParams::new("camera_interface", 999),
            &connector,
            Arc::new(MockCamera::with_defaults()),
            CameraModuleOptions::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_failed_start_releases_camera() {
        let connector = InMemoryConnector::new();
        let camera = Arc::new(MockCamera::new(MockCameraConfig {
            fail_streaming: true,
            ..Default::default()
        }));
        let module = CameraModule::connect(
            ModuleParams::new("camera_interface", 3),
            &connector,
            camera.clone(),
            options(30),
        )
        .unwrap();

        assert!(module.start().is_err());
        assert_eq!(module.state(), ModuleState::Error);
        assert_eq!(camera.releases(), 1);
        assert!(!camera.is_open());
    }

    #[test]
    fn test_lifecycle() {
        let connector = InMemoryConnector::new();
        let (module, camera) = module(&connector, 50);
        assert_eq!(module.state(), ModuleState::Starting);

        module.start().unwrap();
        assert_eq!(module.state(), ModuleState::Running);
        assert!(module.get_status().running);
        module.start().unwrap();
        assert_eq!(module.service().capture_metrics().runs, 1);

        module.stop().unwrap();
        assert_eq!(module.state(), ModuleState::Stopped);
        assert!(!module.get_status().running);
        assert_eq!(camera.releases(), 1);
    }

    #[test]
    fn test_control_topic_updates_settings() {
        let connector = InMemoryConnector::new();
        let (module, camera) = module(&connector, 50);
        module.start().unwrap();

        let bus = connector.domain(3).unwrap();
        bus.publish(topics::DEFAULT_CONTROL_TOPIC, config(&[("brightness", json!(70))]))
            .unwrap();

        assert_eq!(module.get_status().settings.brightness, 70);
        assert_eq!(camera.current_settings().unwrap().brightness, 70);
        module.stop().unwrap();
    }

    #[test]
    fn test_config_topic_rejection_logs_once() {
        let connector = InMemoryConnector::new();
        let (module, _camera) = module(&connector, 30);
        let bus: Arc<dyn MessageBus> = connector.domain(3).unwrap();
        let logs = subscribe_channel(&bus, topics::LOGGING, 64).unwrap();

        bus.publish(
            &topics::config_topic("camera_interface"),
            config(&[("framerate", json!(-5))]),
        )
        .unwrap();

        let warnings = logs
            .drain()
            .into_iter()
            .filter(|m| matches!(m, BusMessage::Log(l) if l.level == LogLevel::Warn))
            .count();
        assert_eq!(warnings, 1);
        assert_eq!(module.get_status().settings.framerate, 30);
    }

    #[test]
    fn test_framerate_change_mid_run() {
        let connector = InMemoryConnector::new();
        let (module, _camera) = module(&connector, 10);
        let bus: Arc<dyn MessageBus> = connector.domain(3).unwrap();
        let frames = subscribe_channel(&bus, topics::DEFAULT_IMAGE_TOPIC, 4096).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        let slow = frames.drain().len();

        module.update_settings(&[("framerate".to_string(), json!(100))].into_iter().collect());
        thread::sleep(Duration::from_millis(300));
        let fast = frames.drain().len();
        module.stop().unwrap();

        assert!(slow <= 5, "slow run published {slow}");
        assert!(fast > slow * 2, "fast run published {fast}, slow {slow}");
    }

    #[test]
    fn test_heartbeat_and_status() {
        let connector = InMemoryConnector::new();
        let (module, _camera) = module(&connector, 30);
        let bus: Arc<dyn MessageBus> = connector.domain(3).unwrap();
        let heartbeats = subscribe_channel(&bus, topics::HEARTBEAT, 16).unwrap();
        let status = subscribe_channel(&bus, topics::DEFAULT_STATUS_TOPIC, 16).unwrap();

        module.tick().unwrap();
        module.publish_status().unwrap();

        match heartbeats.try_recv() {
            Some(BusMessage::Heartbeat(hb)) => {
                assert_eq!(hb.module_id, "camera_interface");
                assert_eq!(hb.status, ModuleState::Starting);
            }
            other => panic!("expected heartbeat, got {other:?}"),
        }
        match status.try_recv() {
            Some(BusMessage::Status(value)) => {
                assert_eq!(value["module"]["running"], json!(false));
                assert_eq!(value["state"], json!("Starting"));
            }
            other => panic!("expected status, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_stops_capture() {
        let connector = InMemoryConnector::new();
        let (module, camera) = module(&connector, 50);
        module.start().unwrap();
        drop(module);
        assert_eq!(camera.releases(), 1);
        assert_eq!(connector.domain(3).unwrap().subscriber_count(topics::DEFAULT_CONTROL_TOPIC), 0);
    }
}
