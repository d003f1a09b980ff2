//! ModuleRuntime - lifecycle state machine + standard topics
//!
//! Mounting a module:
//! - subscribes `/{module_id}/config` and merges updates through the module's
//!   key table (the runtime itself owns the `verbosity` key)
//! - publishes logs on `/logging` via [`ModuleLogger`]
//! - publishes heartbeats on `/heartbeat` when [`ModuleRuntime::tick`] is called
//!
//! Lifecycle calls are serialized by a lifecycle lock; configuration merges by
//! a separate merge lock, since the in-memory bus runs callbacks on whatever
//! thread published. Neither path holds the state lock while a hook runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use contracts::{
    now_millis, topics, BusMessage, ConfigMessage, ContractError, HeartbeatMessage, MergeReport,
    ModuleCapabilities, ModuleIdentity, ModuleState, SubscriptionId, Verbosity,
};
use observability::metrics::{record_config_rejected, record_heartbeat};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::{ModuleContext, ModuleLogger, Result, RuntimeError};

/// Config key handled by the runtime for every module
pub const VERBOSITY_KEY: &str = "verbosity";

struct Inner {
    ctx: ModuleContext,
    module: Arc<dyn ModuleCapabilities>,
    state: RwLock<ModuleState>,
    lifecycle: Mutex<()>,
    merge_lock: Mutex<()>,
    heartbeats: AtomicU64,
    config_merges: AtomicU64,
}

impl Inner {
    fn state(&self) -> ModuleState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` if the state machine allows it
    fn transition(&self, next: ModuleState) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(next) {
            debug!(module = %self.ctx.module_id(), from = %*state, to = %next, "state transition");
            *state = next;
            true
        } else {
            false
        }
    }

    fn fault(&self, reason: &str) -> bool {
        let faulted = self.transition(ModuleState::Error);
        if faulted {
            self.ctx.logger().critical(format!("Module fault: {reason}"));
        }
        faulted
    }

    fn apply_config(&self, update: &ConfigMessage) -> MergeReport {
        let _merge = self.merge_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let logger = self.ctx.logger();
        let module_id = self.ctx.module_id();

        let mut report = MergeReport::default();
        let mut forwarded = ConfigMessage::new();
        for (key, value) in update {
            if key == VERBOSITY_KEY {
                match parse_verbosity(value) {
                    Some(verbosity) => {
                        logger.set_verbosity(verbosity);
                        report.applied(key.clone());
                    }
                    None => report.rejected(
                        key.clone(),
                        format!("expected verbosity name or 0..=4, got {value}"),
                    ),
                }
            } else {
                forwarded.insert(key.clone(), value.clone());
            }
        }

        if !forwarded.is_empty() {
            report.extend(self.module.merge_config(&forwarded));
        }

        for key in &report.unknown {
            record_config_rejected(module_id, key);
            logger.warn(format!("Unknown config key '{key}' ignored"));
        }
        for rejection in &report.rejected {
            record_config_rejected(module_id, &rejection.key);
            logger.warn(format!(
                "Rejected config key '{}': {}",
                rejection.key, rejection.reason
            ));
        }
        if report.has_changes() {
            logger.info(format!("Applied config keys: {}", report.applied.join(", ")));
        }

        self.config_merges.fetch_add(1, Ordering::Relaxed);
        report
    }
}

fn parse_verbosity(value: &Value) -> Option<Verbosity> {
    match value {
        Value::String(s) => Verbosity::parse(s),
        Value::Number(n) => n
            .as_u64()
            .filter(|level| *level <= 4)
            .map(|level| Verbosity::from_level(level as u8)),
        _ => None,
    }
}

/// A mounted module
///
/// Dropping the runtime detaches the config subscription; it does not stop
/// the module.
pub struct ModuleRuntime {
    inner: Arc<Inner>,
    config_subscription: SubscriptionId,
}

impl ModuleRuntime {
    /// Mount `module` on the context's bus and enter `Starting`
    ///
    /// # Errors
    /// Fails if the config topic cannot be subscribed; nothing stays mounted.
    #[instrument(name = "module_mount", skip_all, fields(module_id = %ctx.module_id()))]
    pub fn mount(ctx: ModuleContext, module: Arc<dyn ModuleCapabilities>) -> Result<Self> {
        let config_topic = ctx.identity().config_topic();
        let inner = Arc::new(Inner {
            ctx,
            module,
            state: RwLock::new(ModuleState::Unknown),
            lifecycle: Mutex::new(()),
            merge_lock: Mutex::new(()),
            heartbeats: AtomicU64::new(0),
            config_merges: AtomicU64::new(0),
        });

        // Weak: the bus owns the callback, the runtime owns the bus handle
        let weak: Weak<Inner> = Arc::downgrade(&inner);
        let config_subscription = inner.ctx.bus().subscribe(
            &config_topic,
            Arc::new(move |msg: &BusMessage| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match msg {
                    BusMessage::Config(update) => {
                        inner.apply_config(update);
                    }
                    other => warn!(
                        module = %inner.ctx.module_id(),
                        kind = other.kind(),
                        "Ignoring non-config payload on config topic"
                    ),
                }
            }),
        )?;

        inner.transition(ModuleState::Starting);
        inner
            .ctx
            .logger()
            .debug(format!("Module mounted, listening on {config_topic}"));

        Ok(Self {
            inner,
            config_subscription,
        })
    }

    /// `Starting -> Running`, calling `init_module` once
    ///
    /// A no-op when already `Running`. Hook failure moves the module to
    /// `Error` and logs at `Critical`.
    #[instrument(name = "module_start", skip(self), fields(module_id = %self.inner.ctx.module_id()))]
    pub fn start(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let module_id = self.inner.ctx.module_id().clone();

        match self.inner.state() {
            ModuleState::Running => Ok(()),
            ModuleState::Starting => match self.inner.module.init_module() {
                Ok(()) => {
                    if !self.inner.transition(ModuleState::Running) {
                        // Faulted while the hook was running
                        return Err(RuntimeError::terminal(module_id, self.inner.state()));
                    }
                    self.inner.ctx.logger().info("Module running");
                    Ok(())
                }
                Err(e) => {
                    self.inner.fault(&format!("init_module failed: {e}"));
                    Err(RuntimeError::hook_failed(module_id, "init_module", e))
                }
            },
            state if state.is_terminal() => Err(RuntimeError::terminal(module_id, state)),
            state => Err(ContractError::InvalidTransition {
                from: state,
                to: ModuleState::Running,
            }
            .into()),
        }
    }

    /// `Running -> Stopping -> Stopped`, calling `shutdown_module` once
    ///
    /// A no-op from `Stopped` or `Error`. From `Starting` the module never
    /// initialized, so it stops without calling the hook.
    #[instrument(name = "module_stop", skip(self), fields(module_id = %self.inner.ctx.module_id()))]
    pub fn stop(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        let module_id = self.inner.ctx.module_id().clone();

        match self.inner.state() {
            ModuleState::Starting => {
                self.inner.transition(ModuleState::Stopping);
                self.inner.transition(ModuleState::Stopped);
                self.inner.ctx.logger().info("Module stopped before start");
                Ok(())
            }
            ModuleState::Running => {
                self.inner.transition(ModuleState::Stopping);
                match self.inner.module.shutdown_module() {
                    Ok(()) => {
                        self.inner.transition(ModuleState::Stopped);
                        self.inner.ctx.logger().info("Module stopped");
                        Ok(())
                    }
                    Err(e) => {
                        self.inner.fault(&format!("shutdown_module failed: {e}"));
                        Err(RuntimeError::hook_failed(module_id, "shutdown_module", e))
                    }
                }
            }
            ModuleState::Unknown
            | ModuleState::Stopping
            | ModuleState::Stopped
            | ModuleState::Error => Ok(()),
        }
    }

    /// Publish one heartbeat with the current state
    ///
    /// Non-blocking; the caller owns the clock.
    pub fn tick(&self) -> Result<()> {
        let module_id = self.inner.ctx.module_id();
        let status = self.inner.state();
        let heartbeat = HeartbeatMessage {
            timestamp: now_millis(),
            module_id: module_id.clone(),
            status,
        };

        self.inner
            .ctx
            .bus()
            .publish(topics::HEARTBEAT, BusMessage::Heartbeat(heartbeat))?;
        self.inner.heartbeats.fetch_add(1, Ordering::Relaxed);
        record_heartbeat(module_id, status.as_str());
        Ok(())
    }

    /// Merge a configuration update (same path as the config topic)
    pub fn apply_config(&self, update: &ConfigMessage) -> MergeReport {
        self.inner.apply_config(update)
    }

    /// Move to `Error` from any non-terminal state
    ///
    /// Returns whether the state changed.
    pub fn fault(&self, reason: &str) -> bool {
        self.inner.fault(reason)
    }

    /// Publish a status snapshot on `topic`
    pub fn publish_status(&self, topic: &str) -> Result<()> {
        self.inner
            .ctx
            .bus()
            .publish(topic, BusMessage::Status(self.status()))?;
        Ok(())
    }

    pub fn state(&self) -> ModuleState {
        self.inner.state()
    }

    pub fn identity(&self) -> &ModuleIdentity {
        self.inner.ctx.identity()
    }

    pub fn logger(&self) -> &ModuleLogger {
        self.inner.ctx.logger()
    }

    pub fn context(&self) -> &ModuleContext {
        &self.inner.ctx
    }

    /// Every key accepted on the config topic
    pub fn config_keys(&self) -> Vec<&'static str> {
        let mut keys = self.inner.module.config_keys();
        keys.push(VERBOSITY_KEY);
        keys.sort_unstable();
        keys
    }

    /// Runtime + module status
    pub fn status(&self) -> Value {
        let identity = self.identity();
        json!({
            "module_id": identity.module_id.as_str(),
            "domain_id": identity.domain_id,
            "state": self.inner.state().as_str(),
            "verbosity": self.logger().verbosity(),
            "heartbeats": self.inner.heartbeats.load(Ordering::Relaxed),
            "config_merges": self.inner.config_merges.load(Ordering::Relaxed),
            "module": self.inner.module.status(),
        })
    }

    /// Module metrics
    pub fn metrics(&self) -> Value {
        self.inner.module.metrics()
    }
}

impl Drop for ModuleRuntime {
    fn drop(&mut self) {
        self.inner.ctx.bus().unsubscribe(self.config_subscription);
    }
}
