//! ModuleLogger - 模块日志发布器
//!
//! 每条记录先镜像到 `tracing`，再按模块的 verbosity 决定是否发布到 `/logging`。
//! 发布是尽力而为的：失败只在本地 `tracing` 里留痕，不会向调用方报错。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use contracts::{topics, BusMessage, LogLevel, LogMessage, MessageBus, ModuleId, Verbosity};
use observability::metrics::record_log_published;
use tracing::{debug, error, info, warn};

/// 可克隆的模块日志句柄
///
/// 克隆共享同一个 verbosity，运行期修改对所有克隆立即生效。
#[derive(Clone)]
pub struct ModuleLogger {
    module_id: ModuleId,
    bus: Arc<dyn MessageBus>,
    verbosity: Arc<AtomicU8>,
}

impl ModuleLogger {
    /// 创建日志句柄
    pub fn new(module_id: ModuleId, bus: Arc<dyn MessageBus>, verbosity: Verbosity) -> Self {
        Self {
            module_id,
            bus,
            verbosity: Arc::new(AtomicU8::new(verbosity.level())),
        }
    }

    /// 当前 verbosity
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_level(self.verbosity.load(Ordering::Relaxed))
    }

    /// 修改 verbosity
    pub fn set_verbosity(&self, verbosity: Verbosity) {
        self.verbosity.store(verbosity.level(), Ordering::Relaxed);
    }

    /// 所属模块
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    /// 记录一条日志
    pub fn log(&self, level: LogLevel, text: impl Into<String>) {
        let text = text.into();

        match level {
            LogLevel::Debug => debug!(module = %self.module_id, "{text}"),
            LogLevel::Info => info!(module = %self.module_id, "{text}"),
            LogLevel::Warn => warn!(module = %self.module_id, "{text}"),
            LogLevel::Error => error!(module = %self.module_id, "{text}"),
            LogLevel::Critical => error!(module = %self.module_id, critical = true, "{text}"),
        }

        if !self.verbosity().allows(level) {
            return;
        }

        let record = LogMessage::new(self.module_id.clone(), level, text);
        match self.bus.publish(topics::LOGGING, BusMessage::Log(record)) {
            Ok(()) => record_log_published(&self.module_id, level_label(level)),
            Err(e) => warn!(module = %self.module_id, error = %e, "Failed to publish log record"),
        }
    }

    pub fn debug(&self, text: impl Into<String>) {
        self.log(LogLevel::Debug, text);
    }

    pub fn info(&self, text: impl Into<String>) {
        self.log(LogLevel::Info, text);
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.log(LogLevel::Warn, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.log(LogLevel::Error, text);
    }

    pub fn critical(&self, text: impl Into<String>) {
        self.log(LogLevel::Critical, text);
    }
}

fn level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
        LogLevel::Critical => "critical",
    }
}
