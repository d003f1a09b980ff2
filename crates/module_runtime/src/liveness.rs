//! LivenessMonitor - `/heartbeat` 消费端
//!
//! 记录每个模块最近一次心跳的本地接收时刻，超过超时时间未更新的模块
//! 视为无响应。使用本地单调时钟，不依赖发送方的时间戳。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use contracts::{topics, BusMessage, HeartbeatMessage, MessageBus, ModuleId, ModuleState, SubscriptionId};
use tracing::debug;

use crate::Result;

/// 单个模块的最近心跳
#[derive(Debug, Clone)]
pub struct LastSeen {
    /// 本地接收时刻
    pub received_at: Instant,
    /// 发送方时间戳 (毫秒)
    pub timestamp: i64,
    /// 心跳携带的状态
    pub status: ModuleState,
}

type SeenTable = Arc<Mutex<HashMap<ModuleId, LastSeen>>>;

/// 心跳监控器
pub struct LivenessMonitor {
    bus: Arc<dyn MessageBus>,
    subscription: SubscriptionId,
    timeout: Duration,
    seen: SeenTable,
}

impl LivenessMonitor {
    /// 订阅 `/heartbeat`
    pub fn attach(bus: Arc<dyn MessageBus>, timeout: Duration) -> Result<Self> {
        let seen: SeenTable = Arc::default();

        let table = seen.clone();
        let subscription = bus.subscribe(
            topics::HEARTBEAT,
            Arc::new(move |msg: &BusMessage| {
                if let BusMessage::Heartbeat(hb) = msg {
                    record(&table, hb, Instant::now());
                }
            }),
        )?;

        Ok(Self {
            bus,
            subscription,
            timeout,
            seen,
        })
    }

    /// 超时时间
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 手动记录一条心跳
    pub fn observe(&self, heartbeat: &HeartbeatMessage, received_at: Instant) {
        record(&self.seen, heartbeat, received_at);
    }

    /// 当前无响应的模块
    pub fn unresponsive(&self) -> Vec<ModuleId> {
        self.unresponsive_at(Instant::now())
    }

    /// 以 `now` 为基准计算无响应的模块 (有序)
    pub fn unresponsive_at(&self, now: Instant) -> Vec<ModuleId> {
        let seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stale: Vec<ModuleId> = seen
            .iter()
            .filter(|(_, last)| now.saturating_duration_since(last.received_at) > self.timeout)
            .map(|(id, _)| id.clone())
            .collect();
        stale.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        stale
    }

    /// 模块最近一次心跳
    pub fn last_seen(&self, module_id: &str) -> Option<LastSeen> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module_id)
            .cloned()
    }

    /// 所有见过的模块数
    pub fn known_modules(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for LivenessMonitor {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}

fn record(table: &SeenTable, hb: &HeartbeatMessage, received_at: Instant) {
    let mut seen = table.lock().unwrap_or_else(PoisonError::into_inner);
    let previous = seen.insert(
        hb.module_id.clone(),
        LastSeen {
            received_at,
            timestamp: hb.timestamp,
            status: hb.status,
        },
    );
    if previous.map(|p| p.status) != Some(hb.status) {
        debug!(module = %hb.module_id, status = %hb.status, "heartbeat status changed");
    }
}
