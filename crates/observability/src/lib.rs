//! # Observability
//!
//! Dashcam 进程的日志与指标出口。
//!
//! - `tracing` 订阅器：JSON / Pretty / Compact，`RUST_LOG` 优先
//! - Prometheus 导出器：`/metrics`，带 `service="dashcam"` 全局标签
//! - [`metrics`]：采集循环、运行时、总线调用的记录函数与运行摘要
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig {
//!     log_format: LogFormat::Compact,
//!     metrics_port: None,
//!     default_log_level: "info".into(),
//! })?;
//! observability::metrics::record_fps("camera_interface", 29.8);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_bus_publish, record_capture_failure, record_channel_dropped, record_config_rejected,
    record_fps, record_frame_published, record_heartbeat, record_iteration_ms,
    record_log_published, record_undistort_failure, CaptureSample, CaptureStatsAggregator,
    CaptureSummary, RunningStats, StatsSummary,
};

/// Workspace crates that follow the default level; everything else is held at `warn`
const DASHCAM_TARGETS: [&str; 7] = [
    "contracts",
    "config_loader",
    "bus",
    "module_runtime",
    "capture",
    "observability",
    "dashcam",
];

/// 采集迭代耗时直方图的分桶 (毫秒)
const ITERATION_MS_BUCKETS: [f64; 10] = [0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 33.0, 50.0, 100.0, 250.0];

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// `RUST_LOG` 未设置时 dashcam crate 的日志级别
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志 (车载采集盒上交给日志收集器)
    Json,
    /// 多行可读格式
    Pretty,
    /// 单行格式
    #[default]
    Compact,
}

/// Filter directives used when `RUST_LOG` is absent
fn default_directives(level: &str) -> String {
    std::iter::once("warn".to_string())
        .chain(DASHCAM_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// 初始化 tracing，可选启动 Prometheus 导出器
///
/// 进程内只能调用一次；重复初始化返回错误。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(&config.default_log_level))
            .with_context(|| format!("Invalid log level '{}'", config.default_log_level))?,
    };

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_names(true)
            .boxed(),
        // capture-<module_id> thread names tell the acquisition thread apart
        LogFormat::Pretty => fmt::layer().pretty().with_thread_names(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_thread_names(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// 仅启动 Prometheus 导出器 (tracing 已初始化时使用)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .add_global_label("service", "dashcam")
        .set_buckets_for_metric(
            Matcher::Full("dashcam_capture_iteration_ms".to_string()),
            &ITERATION_MS_BUCKETS,
        )
        .context("Invalid histogram buckets")?
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint listening");
    Ok(())
}
