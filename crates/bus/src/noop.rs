//! No-op bus backend
//!
//! Same interface as the in-memory bus; publishes are accepted and dropped,
//! subscriptions are registered but never called. Selected with
//! `dds.backend = "noop"` for running a module without any peers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{
    BusConnector, BusMessage, ContractError, DomainId, MessageBus, MessageCallback,
    SubscriptionId,
};
use tracing::trace;

/// Bus that delivers nothing
pub struct NoopBus {
    domain_id: DomainId,
    next_id: AtomicU64,
}

impl NoopBus {
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            next_id: AtomicU64::new(1),
        }
    }
}

impl MessageBus for NoopBus {
    fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    fn publish(&self, topic: &str, message: BusMessage) -> Result<(), ContractError> {
        trace!(topic, kind = message.kind(), "noop publish");
        Ok(())
    }

    fn subscribe(
        &self,
        _topic: &str,
        _callback: MessageCallback,
    ) -> Result<SubscriptionId, ContractError> {
        Ok(SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}
}

/// Connector for [`NoopBus`]; every domain is reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConnector;

impl BusConnector for NoopConnector {
    fn connect(&self, domain_id: DomainId) -> Result<Arc<dyn MessageBus>, ContractError> {
        Ok(Arc::new(NoopBus::new(domain_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_noop_never_delivers() {
        let bus = NoopConnector.connect(0).unwrap();
        let called = Arc::new(AtomicBool::new(false));
        let c = called.clone();
        bus.subscribe("t", Arc::new(move |_| c.store(true, Ordering::Relaxed)))
            .unwrap();
        bus.publish("t", BusMessage::Config(Default::default()))
            .unwrap();
        assert!(!called.load(Ordering::Relaxed));
    }
}
