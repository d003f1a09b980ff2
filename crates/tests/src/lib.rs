//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置文件 -> 相机模块的装配
//! - 模拟 e2e 测试（内存总线 + 模拟相机，无需硬件）
//! - 多模块共享总线域时的心跳与日志

#[cfg(test)]
mod contract_tests {
    use contracts::{topics, ModuleIdentity};

    #[test]
    fn test_standard_topics() {
        let identity = ModuleIdentity::new("camera_interface", 0);
        assert_eq!(identity.config_topic(), "/camera_interface/config");
        assert_eq!(topics::config_topic("gps"), "/gps/config");
        assert_ne!(topics::LOGGING, topics::HEARTBEAT);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use bus::{subscribe_channel, ChannelSubscription, InMemoryConnector};
    use bytes::Bytes;
    use capture::{
        CameraDevice, CameraModule, CameraModuleOptions, MockCamera, MockCameraConfig,
    };
    use config_loader::{
        resolve_calibration, save_calibration, CalibrationConfig, ConfigFormat, ConfigLoader,
        DashcamConfig,
    };
    use contracts::{
        topics, BusMessage, CalibrationRecord, CameraSettings, ConfigMessage, ContractError,
        ImageFrame, ImageMessage, LogLevel, MessageBus, ModuleState, PixelFormat, Resolution,
    };
    use module_runtime::{LivenessMonitor, ModuleParams};
    use serde_json::json;

    const DOMAIN: u32 = 7;

    fn options_from(config: &DashcamConfig, calibration: CalibrationRecord) -> CameraModuleOptions {
        let mut options = CameraModuleOptions {
            control_topic: config.dds.control_topic.clone(),
            status_topic: config.dds.status_topic.clone(),
            ..Default::default()
        };
        options.capture.settings = config.camera.clone();
        options.capture.calibration = calibration;
        options.capture.image_topic = config.dds.image_topic.clone();
        options.capture.join_timeout = config.runtime.join_timeout();
        options
    }

    fn small_config(module_id: &str, framerate: u32) -> DashcamConfig {
        let mut config = DashcamConfig::default();
        config.module_id = module_id.into();
        config.dds.domain_id = DOMAIN;
        config.camera.resolution = Resolution::new(8, 4);
        config.camera.framerate = framerate;
        config.calibration.auto_load = false;
        config
    }

    fn mount(
        connector: &InMemoryConnector,
        config: &DashcamConfig,
        camera: Arc<dyn CameraDevice>,
        calibration: CalibrationRecord,
    ) -> CameraModule {
        CameraModule::connect(
            ModuleParams::new(config.module_id.as_str(), config.dds.domain_id),
            connector,
            camera,
            options_from(config, calibration),
        )
        .unwrap()
    }

    fn domain_bus(connector: &InMemoryConnector) -> Arc<dyn MessageBus> {
        connector.domain(DOMAIN).unwrap()
    }

    fn images(subscription: &ChannelSubscription) -> Vec<ImageMessage> {
        subscription
            .drain()
            .into_iter()
            .filter_map(|msg| match msg {
                BusMessage::Image(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    fn count_logs(subscription: &ChannelSubscription, level: LogLevel) -> usize {
        subscription
            .drain()
            .into_iter()
            .filter(|msg| matches!(msg, BusMessage::Log(log) if log.level == level))
            .count()
    }

    fn update(pairs: &[(&str, serde_json::Value)]) -> ConfigMessage {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Camera that always returns the same frame
    struct StillCamera {
        frame: ImageFrame,
        open: std::sync::atomic::AtomicBool,
    }

    impl StillCamera {
        fn new(width: u32, height: u32) -> Self {
            let data: Vec<u8> = (0..width * height * 3).map(|i| (i * 7 % 251) as u8).collect();
            Self {
                frame: ImageFrame {
                    width,
                    height,
                    format: PixelFormat::Bgr8,
                    data: Bytes::from(data),
                },
                open: Default::default(),
            }
        }
    }

    impl CameraDevice for StillCamera {
        fn name(&self) -> &str {
            "still"
        }
        fn open(&self, _resolution: Resolution) -> Result<(), ContractError> {
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
        fn apply_settings(&self, _settings: &CameraSettings) -> Result<(), ContractError> {
            Ok(())
        }
        fn start_streaming(&self) -> Result<(), ContractError> {
            Ok(())
        }
        fn stop_streaming(&self) -> Result<(), ContractError> {
            Ok(())
        }
        fn capture(&self) -> Result<Option<ImageFrame>, ContractError> {
            Ok(Some(self.frame.clone()))
        }
        fn release(&self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    /// Camera whose capture call panics after a few frames
    struct CrashingCamera {
        inner: MockCamera,
        captures: AtomicU64,
        crash_after: u64,
    }

    impl CameraDevice for CrashingCamera {
        fn name(&self) -> &str {
            "crashing"
        }
        fn open(&self, resolution: Resolution) -> Result<(), ContractError> {
            self.inner.open(resolution)
        }
        fn is_open(&self) -> bool {
            self.inner.is_open()
        }
        fn apply_settings(&self, settings: &CameraSettings) -> Result<(), ContractError> {
            self.inner.apply_settings(settings)
        }
        fn start_streaming(&self) -> Result<(), ContractError> {
            self.inner.start_streaming()
        }
        fn stop_streaming(&self) -> Result<(), ContractError> {
            self.inner.stop_streaming()
        }
        fn capture(&self) -> Result<Option<ImageFrame>, ContractError> {
            if self.captures.fetch_add(1, Ordering::SeqCst) >= self.crash_after {
                panic!("driver crashed");
            }
            self.inner.capture()
        }
        fn release(&self) {
            self.inner.release()
        }
    }

    /// 配置文件 -> 模块 -> 图像主题
    #[test]
    fn test_config_file_to_published_frames() {
        let content = format!(
            r#"
module_id = "front_cam"

[camera]
resolution = [16, 8]
framerate = 50

[dds]
domain_id = {DOMAIN}
image_topic = "front/raw"

[calibration]
auto_load = false
"#
        );
        let config = ConfigLoader::load_from_str(&content, ConfigFormat::Toml).unwrap();
        let connector = InMemoryConnector::new();
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            resolve_calibration(&config.calibration),
        );
        let frames = subscribe_channel(&domain_bus(&connector), "front/raw", 1024).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        module.stop().unwrap();

        let published = images(&frames);
        assert!(!published.is_empty());
        let first = &published[0].metadata;
        assert_eq!(first.source_module, "front_cam");
        assert_eq!((first.width, first.height, first.channels), (16, 8, 3));
        assert_eq!(published[0].data.len(), 16 * 8 * 3);
    }

    /// 发布速率不超过帧率，序号从 0 连续递增
    #[test]
    fn test_rate_bound_and_sequence_ids() {
        let connector = InMemoryConnector::new();
        let config = small_config("rate_cam", 20);
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        let frames = subscribe_channel(&domain_bus(&connector), &config.dds.image_topic, 1024).unwrap();

        let started = Instant::now();
        module.start().unwrap();
        thread::sleep(Duration::from_millis(500));
        module.stop().unwrap();
        let elapsed = started.elapsed().as_secs_f64();

        let published = images(&frames);
        let bound = (elapsed * 20.0).ceil() as usize + 1;
        assert!(published.len() <= bound, "{} frames > bound {bound}", published.len());
        assert!(published.len() >= 3, "only {} frames", published.len());

        for (expected, image) in published.iter().enumerate() {
            assert_eq!(image.metadata.sequence_id, expected as u64);
        }
        let timestamps: Vec<i64> = published.iter().map(|m| m.metadata.timestamp_micros).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    /// 缺帧不占用序号，继续按帧率重试
    #[test]
    fn test_absent_frames_keep_sequence_dense() {
        let connector = InMemoryConnector::new();
        let config = small_config("flaky_cam", 100);
        let camera = Arc::new(MockCamera::new(MockCameraConfig {
            absent_every: Some(3),
            ..Default::default()
        }));
        let module = mount(&connector, &config, camera.clone(), CalibrationRecord::uncalibrated());
        let frames = subscribe_channel(&domain_bus(&connector), &config.dds.image_topic, 1024).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        module.stop().unwrap();

        let published = images(&frames);
        assert!(camera.attempts() > published.len() as u64);
        for (expected, image) in published.iter().enumerate() {
            assert_eq!(image.metadata.sequence_id, expected as u64);
        }
        assert!(module.service().capture_metrics().capture_failures > 0);
    }

    /// 运行中通过控制主题修改帧率，无需重启线程
    #[test]
    fn test_control_topic_framerate_change() {
        let connector = InMemoryConnector::new();
        let config = small_config("ctl_cam", 10);
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        let bus = domain_bus(&connector);
        let frames = subscribe_channel(&bus, &config.dds.image_topic, 4096).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(400));
        let slow = images(&frames).len();

        bus.publish(
            &config.dds.control_topic,
            BusMessage::Config(update(&[("framerate", json!(100))])),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(400));
        let fast = images(&frames).len();
        module.stop().unwrap();

        assert_eq!(module.get_status().settings.framerate, 100);
        assert_eq!(module.service().capture_metrics().runs, 1);
        assert!(fast > slow * 2, "fast {fast}, slow {slow}");
    }

    /// 非法帧率：保留旧值，恰好一条 Warn
    #[test]
    fn test_negative_framerate_rejected_with_one_warning() {
        let connector = InMemoryConnector::new();
        let config = small_config("neg_cam", 30);
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        let bus = domain_bus(&connector);
        let logs = subscribe_channel(&bus, topics::LOGGING, 64).unwrap();

        bus.publish(
            &config.dds.control_topic,
            BusMessage::Config(update(&[("framerate", json!(-5))])),
        )
        .unwrap();

        assert_eq!(count_logs(&logs, LogLevel::Warn), 1);
        assert_eq!(module.get_status().settings.framerate, 30);
        assert_eq!(module.state(), ModuleState::Starting);
    }

    /// 配置主题：已知键生效，未知键一条 Warn，状态不变
    #[test]
    fn test_config_topic_known_and_unknown_key() {
        let connector = InMemoryConnector::new();
        let config = small_config("cfg_cam", 30);
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        module.start().unwrap();
        let bus = domain_bus(&connector);
        let logs = subscribe_channel(&bus, topics::LOGGING, 64).unwrap();

        bus.publish(
            &topics::config_topic("cfg_cam"),
            BusMessage::Config(update(&[("brightness", json!(65)), ("turbo", json!(true))])),
        )
        .unwrap();

        assert_eq!(count_logs(&logs, LogLevel::Warn), 1);
        assert_eq!(module.get_status().settings.brightness, 65);
        assert_eq!(module.state(), ModuleState::Running);
        module.stop().unwrap();
    }

    /// verbosity 经配置主题调整后，Info 不再上总线
    #[test]
    fn test_verbosity_silences_bus_logging() {
        let connector = InMemoryConnector::new();
        let config = small_config("quiet_cam", 30);
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        let bus = domain_bus(&connector);
        let logs = subscribe_channel(&bus, topics::LOGGING, 256).unwrap();

        bus.publish(
            &topics::config_topic("quiet_cam"),
            BusMessage::Config(update(&[("verbosity", json!("error"))])),
        )
        .unwrap();
        logs.drain();

        module.start().unwrap();
        module.stop().unwrap();
        assert_eq!(count_logs(&logs, LogLevel::Info), 0);
    }

    /// 相机卡死：stop() 在 join timeout 内返回并强制释放
    #[test]
    fn test_stop_is_bounded_when_camera_hangs() {
        let connector = InMemoryConnector::new();
        let mut config = small_config("hung_cam", 50);
        config.runtime.join_timeout_ms = 150;
        let camera = Arc::new(MockCamera::with_defaults());
        let module = mount(&connector, &config, camera.clone(), CalibrationRecord::uncalibrated());
        let logs = subscribe_channel(&domain_bus(&connector), topics::LOGGING, 256).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        camera.set_hang(true);
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        module.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(module.state(), ModuleState::Stopped);
        assert!(!module.get_status().running);
        assert!(camera.releases() >= 1);
        assert!(count_logs(&logs, LogLevel::Error) >= 1);
    }

    /// 恒等标定：已标定但像素不变
    #[test]
    fn test_identity_calibration_from_file_preserves_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera_calibration.json");
        save_calibration(&path, &CalibrationRecord::identity(8, 4)).unwrap();

        let calibration = resolve_calibration(&CalibrationConfig {
            auto_load: true,
            file: path,
        });
        assert!(calibration.calibrated);

        let connector = InMemoryConnector::new();
        let config = small_config("ident_cam", 50);
        let camera = Arc::new(StillCamera::new(8, 4));
        let expected = camera.frame.data.clone();
        let module = mount(&connector, &config, camera, calibration);
        let frames = subscribe_channel(&domain_bus(&connector), &config.dds.image_topic, 256).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(150));
        module.stop().unwrap();

        let published = images(&frames);
        assert!(!published.is_empty());
        assert!(module.get_status().calibrated);
        assert!(published.iter().all(|image| image.data == expected));
        assert_eq!(module.service().capture_metrics().undistort_failures, 0);
    }

    /// 缺失的标定文件：未标定运行，照常发布原始帧
    #[test]
    fn test_missing_calibration_runs_uncalibrated() {
        let dir = tempfile::tempdir().unwrap();
        let calibration = resolve_calibration(&CalibrationConfig {
            auto_load: true,
            file: dir.path().join("absent.json"),
        });
        assert!(!calibration.calibrated);

        let connector = InMemoryConnector::new();
        let config = small_config("raw_cam", 50);
        let camera = Arc::new(StillCamera::new(8, 4));
        let expected = camera.frame.data.clone();
        let module = mount(&connector, &config, camera, calibration);
        let frames = subscribe_channel(&domain_bus(&connector), &config.dds.image_topic, 256).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        module.stop().unwrap();

        assert!(!module.get_status().calibrated);
        assert!(images(&frames).iter().all(|image| image.data == expected));
    }

    /// 采集线程意外退出 -> 下一次心跳前进入 Error
    #[test]
    fn test_crashed_capture_thread_faults_module() {
        let connector = InMemoryConnector::new();
        let config = small_config("crash_cam", 100);
        let camera = Arc::new(CrashingCamera {
            inner: MockCamera::with_defaults(),
            captures: AtomicU64::new(0),
            crash_after: 3,
        });
        let module = mount(&connector, &config, camera, CalibrationRecord::uncalibrated());
        let heartbeats = subscribe_channel(&domain_bus(&connector), topics::HEARTBEAT, 16).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        module.tick().unwrap();

        assert_eq!(module.state(), ModuleState::Error);
        match heartbeats.try_recv() {
            Some(BusMessage::Heartbeat(hb)) => assert_eq!(hb.status, ModuleState::Error),
            other => panic!("expected heartbeat, got {other:?}"),
        }
        assert!(module.start().is_err());
    }

    /// 相机打不开：start 失败，模块进入 Error
    #[test]
    fn test_camera_open_failure_faults_module() {
        let connector = InMemoryConnector::new();
        let config = small_config("dead_cam", 30);
        let camera = Arc::new(MockCamera::new(MockCameraConfig {
            fail_open: true,
            ..Default::default()
        }));
        let module = mount(&connector, &config, camera, CalibrationRecord::uncalibrated());
        let logs = subscribe_channel(&domain_bus(&connector), topics::LOGGING, 64).unwrap();

        assert!(module.start().is_err());
        assert_eq!(module.state(), ModuleState::Error);
        assert!(count_logs(&logs, LogLevel::Critical) >= 1);
    }

    /// 同一域内两个模块：心跳监控器分别追踪
    #[tokio::test(flavor = "multi_thread")]
    async fn test_liveness_monitor_tracks_modules_on_shared_domain() {
        let connector = InMemoryConnector::new();
        let front = mount(
            &connector,
            &small_config("front", 30),
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        let mut rear_config = small_config("rear", 30);
        rear_config.dds.image_topic = "rear/raw".into();
        rear_config.dds.control_topic = "rear/control".into();
        rear_config.dds.status_topic = "rear/status".into();
        let rear = mount(
            &connector,
            &rear_config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );

        let monitor = LivenessMonitor::attach(domain_bus(&connector), Duration::from_millis(200)).unwrap();

        tokio::task::block_in_place(|| front.start()).unwrap();
        let mut heartbeat = tokio::time::interval(Duration::from_millis(50));
        for round in 0..8 {
            heartbeat.tick().await;
            front.tick().unwrap();
            // rear stops reporting after the first round
            if round == 0 {
                rear.tick().unwrap();
            }
        }

        assert_eq!(monitor.known_modules(), 2);
        assert_eq!(
            monitor.last_seen("front").map(|seen| seen.status),
            Some(ModuleState::Running)
        );
        let stale = monitor.unresponsive();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0], "rear");

        tokio::task::block_in_place(|| front.stop()).unwrap();
    }

    /// 状态主题上的快照
    #[test]
    fn test_status_report_reflects_running_module() {
        let connector = InMemoryConnector::new();
        let config = small_config("status_cam", 50);
        let module = mount(
            &connector,
            &config,
            Arc::new(MockCamera::with_defaults()),
            CalibrationRecord::uncalibrated(),
        );
        let status = subscribe_channel(&domain_bus(&connector), &config.dds.status_topic, 8).unwrap();

        module.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        module.publish_status().unwrap();
        module.stop().unwrap();

        match status.try_recv() {
            Some(BusMessage::Status(value)) => {
                assert_eq!(value["state"], json!("Running"));
                assert_eq!(value["module"]["running"], json!(true));
            }
            other => panic!("expected status, got {other:?}"),
        }
    }
}
