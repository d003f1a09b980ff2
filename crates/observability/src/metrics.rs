//! Dashcam 指标收集模块
//!
//! 采集循环、模块运行时与总线在关键路径上调用这里的函数记录指标，
//! 运行结束时由 [`CaptureStatsAggregator`] 输出摘要。

use metrics::{counter, gauge, histogram};

/// 记录一帧图像已发布
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_frame_published;
///
/// bus.publish(&image_topic, BusMessage::Image(msg))?;
/// record_frame_published(&module_id, sequence_id, payload_len);
/// ```
pub fn record_frame_published(module_id: &str, sequence_id: u64, bytes: usize) {
    counter!("dashcam_frames_published_total", "module" => module_id.to_string()).increment(1);
    counter!("dashcam_frame_bytes_total", "module" => module_id.to_string())
        .increment(bytes as u64);
    gauge!("dashcam_last_sequence_id", "module" => module_id.to_string())
        .set(sequence_id as f64);
}

/// 记录一次采集失败 (无帧 / 相机错误)
pub fn record_capture_failure(module_id: &str, reason: &str) {
    counter!(
        "dashcam_capture_failures_total",
        "module" => module_id.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录一次畸变校正失败 (帧以未校正形式发布)
pub fn record_undistort_failure(module_id: &str) {
    counter!("dashcam_undistort_failures_total", "module" => module_id.to_string()).increment(1);
}

/// 记录最新的 FPS 估计
pub fn record_fps(module_id: &str, fps: f64) {
    gauge!("dashcam_capture_fps", "module" => module_id.to_string()).set(fps);
}

/// 记录单次采集循环耗时 (采集 + 校正 + 发布)
pub fn record_iteration_ms(module_id: &str, elapsed_ms: f64) {
    histogram!("dashcam_capture_iteration_ms", "module" => module_id.to_string())
        .record(elapsed_ms);
}

/// 记录心跳发布
pub fn record_heartbeat(module_id: &str, state: &str) {
    counter!(
        "dashcam_heartbeats_total",
        "module" => module_id.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// 记录日志消息发布到总线
pub fn record_log_published(module_id: &str, level: &str) {
    counter!(
        "dashcam_log_records_published_total",
        "module" => module_id.to_string(),
        "level" => level.to_string()
    )
    .increment(1);
}

/// 记录被拒绝的配置项 (未知键或非法值)
pub fn record_config_rejected(module_id: &str, key: &str) {
    counter!(
        "dashcam_config_rejected_total",
        "module" => module_id.to_string(),
        "key" => key.to_string()
    )
    .increment(1);
}

/// 记录总线发布
pub fn record_bus_publish(topic: &str, kind: &'static str) {
    counter!(
        "dashcam_bus_messages_published_total",
        "topic" => topic.to_string(),
        "kind" => kind
    )
    .increment(1);
}

/// 记录通道订阅因队列满而丢弃的消息
pub fn record_channel_dropped(topic: &str) {
    counter!("dashcam_bus_channel_dropped_total", "topic" => topic.to_string()).increment(1);
}

/// 一次采样得到的采集计数 (累计值)
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureSample {
    pub frames_published: u64,
    pub capture_failures: u64,
    pub undistort_failures: u64,
    pub fps: f64,
}

/// 采集指标聚合器
///
/// 周期性地喂入累计计数，在内存中统计 FPS 分布，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct CaptureStatsAggregator {
    /// 采样次数
    pub samples: u64,

    /// 最近一次的累计值
    pub last: CaptureSample,

    /// FPS 统计 (只统计运行中的非零样本)
    pub fps_stats: RunningStats,
}

impl CaptureStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, sample: CaptureSample) {
        self.samples += 1;
        if sample.fps > 0.0 {
            self.fps_stats.push(sample.fps);
        }
        self.last = sample;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> CaptureSummary {
        let attempts = self.last.frames_published + self.last.capture_failures;
        CaptureSummary {
            frames_published: self.last.frames_published,
            capture_failures: self.last.capture_failures,
            undistort_failures: self.last.undistort_failures,
            failure_rate: if attempts > 0 {
                self.last.capture_failures as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            fps: StatsSummary::from(&self.fps_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 采集摘要
#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub frames_published: u64,
    pub capture_failures: u64,
    pub undistort_failures: u64,
    pub failure_rate: f64,
    pub fps: StatsSummary,
}

impl std::fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        writeln!(f, "Frames published: {}", self.frames_published)?;
        writeln!(
            f,
            "Capture failures: {} ({:.2}%)",
            self.capture_failures, self.failure_rate
        )?;
        writeln!(f, "Undistort failures: {}", self.undistort_failures)?;
        writeln!(f, "FPS: {}", self.fps)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.2}, max={:.2}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [28.0, 29.0, 30.0, 31.0, 32.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 30.0).abs() < 1e-10);
        assert!((stats.min() - 28.0).abs() < 1e-10);
        assert!((stats.max() - 32.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_skips_idle_fps() {
        let mut aggregator = CaptureStatsAggregator::new();
        aggregator.update(CaptureSample {
            fps: 0.0,
            ..Default::default()
        });
        aggregator.update(CaptureSample {
            frames_published: 30,
            capture_failures: 10,
            undistort_failures: 1,
            fps: 30.0,
        });

        let summary = aggregator.summary();
        assert_eq!(aggregator.samples, 2);
        assert_eq!(summary.fps.count, 1);
        assert_eq!(summary.frames_published, 30);
        assert!((summary.failure_rate - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = CaptureStatsAggregator::new().summary();
        let text = summary.to_string();
        assert!(text.contains("Capture Summary"));
        assert!(text.contains("FPS: N/A"));
    }

    #[test]
    fn test_recorders_without_installed_recorder() {
        // 未安装 recorder 时调用应为空操作
        record_frame_published("cam", 0, 6);
        record_capture_failure("cam", "no_frame");
        record_fps("cam", 29.5);
        record_bus_publish("/heartbeat", "heartbeat");
    }
}
