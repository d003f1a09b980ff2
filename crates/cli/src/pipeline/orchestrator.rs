//! Capture runner - mounts the camera module and drives its clock.
//!
//! The module owns the capture thread; this task only emits heartbeats and
//! status reports on their intervals and waits for shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capture::{CameraModule, CameraModuleOptions, CaptureOptions, MockCamera};
use config_loader::{resolve_calibration, DashcamConfig};
use contracts::ModuleState;
use module_runtime::ModuleParams;
use observability::CaptureSample;
use tracing::{error, info, warn};

use super::RunStats;
use crate::error::CliError;

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Resolved process configuration
    pub config: DashcamConfig,

    /// Stop after this long (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main capture runner
pub struct CaptureRunner {
    config: RunnerConfig,
}

impl CaptureRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the duration elapses or the module faults
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<RunStats> {
        let start_time = Instant::now();
        let config = &self.config.config;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let module = self.mount(config)?;
        info!(identity = %module.identity(), "Camera module mounted");

        tokio::task::block_in_place(|| module.start()).map_err(|e| {
            CliError::startup(config.module_id.clone(), e.to_string())
        })?;

        let mut stats = RunStats {
            module_id: config.module_id.clone(),
            ..Default::default()
        };

        let outcome = self.drive(&module, &mut stats, shutdown).await;

        info!("Stopping camera module...");
        if let Err(e) = tokio::task::block_in_place(|| module.stop()) {
            warn!(error = %e, "Camera module did not stop cleanly");
        }

        stats.capture.update(sample(&module));
        stats.final_state = module.state();
        stats.duration = start_time.elapsed();

        outcome.map(|()| stats)
    }

    fn mount(&self, config: &DashcamConfig) -> Result<CameraModule> {
        let calibration = resolve_calibration(&config.calibration);
        let connector = bus::connector_for(config.dds.backend);

        let params = ModuleParams::new(config.module_id.as_str(), config.dds.domain_id)
            .with_verbosity(config.runtime.verbosity);
        let options = CameraModuleOptions {
            capture: CaptureOptions {
                settings: config.camera.clone(),
                calibration,
                undistorter: None,
                image_topic: config.dds.image_topic.clone(),
                join_timeout: config.runtime.join_timeout(),
            },
            control_topic: config.dds.control_topic.clone(),
            status_topic: config.dds.status_topic.clone(),
        };

        let camera = Arc::new(MockCamera::with_defaults());
        info!("Using mock camera (no hardware driver configured)");

        CameraModule::connect(params, connector.as_ref(), camera, options).with_context(|| {
            format!(
                "Failed to mount '{}' on domain {}",
                config.module_id, config.dds.domain_id
            )
        })
    }

    async fn drive(
        &self,
        module: &CameraModule,
        stats: &mut RunStats,
        shutdown: impl Future<Output = ()>,
    ) -> Result<()> {
        let runtime = &self.config.config.runtime;
        let mut heartbeat = tokio::time::interval(runtime.heartbeat_interval());
        let mut status = tokio::time::interval(runtime.status_interval());

        let deadline = self.config.duration;
        let elapsed = async move {
            match deadline {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(shutdown);
        tokio::pin!(elapsed);

        info!(duration = ?deadline, "Camera module running");

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = module.tick() {
                        warn!(error = %e, "Heartbeat publish failed");
                    }
                    stats.heartbeats += 1;
                    if module.state() == ModuleState::Error {
                        error!(module_id = %stats.module_id, "Camera module faulted");
                        return Err(CliError::module_faulted(stats.module_id.clone()).into());
                    }
                }
                _ = status.tick() => {
                    if let Err(e) = module.publish_status() {
                        warn!(error = %e, "Status publish failed");
                    }
                    stats.status_reports += 1;
                    stats.capture.update(sample(module));
                }
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping capture...");
                    return Ok(());
                }
                _ = &mut elapsed => {
                    info!("Run duration elapsed");
                    return Ok(());
                }
            }
        }
    }
}

fn sample(module: &CameraModule) -> CaptureSample {
    let metrics = module.service().capture_metrics();
    CaptureSample {
        frames_published: metrics.frames_published,
        capture_failures: metrics.capture_failures,
        undistort_failures: metrics.undistort_failures,
        fps: module.get_status().fps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BusBackend, Resolution};

    fn runner_config(duration_ms: u64) -> RunnerConfig {
        let mut config = DashcamConfig::default();
        config.module_id = "runner_test".into();
        config.dds.domain_id = 17;
        config.camera.resolution = Resolution::new(8, 4);
        config.camera.framerate = 50;
        config.calibration.auto_load = false;
        config.runtime.heartbeat_interval_ms = 50;
        config.runtime.status_interval_ms = 100;

        RunnerConfig {
            config,
            duration: Some(Duration::from_millis(duration_ms)),
            metrics_port: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_for_duration() {
        let runner = CaptureRunner::new(runner_config(400));
        let stats = runner.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.final_state, ModuleState::Stopped);
        assert!(stats.heartbeats >= 2);
        assert!(stats.capture.last.frames_published > 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shutdown_signal_stops_run() {
        let mut config = runner_config(60_000);
        config.config.dds.backend = BusBackend::Noop;
        let runner = CaptureRunner::new(config);

        let started = Instant::now();
        let stats = runner
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(stats.final_state, ModuleState::Stopped);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_domain_fails() {
        let mut config = runner_config(100);
        config.config.dds.domain_id = 500;
        let result = CaptureRunner::new(config).run(std::future::pending()).await;
        assert!(result.is_err());
    }
}
