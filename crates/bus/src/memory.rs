//! In-memory bus backend
//!
//! Topics live in process memory. Every handle connected to the same domain
//! through the same [`InMemoryConnector`] shares one topic table, so modules
//! in one process see each other's messages.
//!
//! Callbacks run synchronously on the publishing thread, outside the topic
//! lock, so a callback may itself publish or subscribe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use contracts::{
    BusConnector, BusMessage, ContractError, DomainId, MessageBus, MessageCallback,
    SubscriptionId,
};
use observability::metrics::record_bus_publish;
use tracing::{debug, trace};

/// Highest joinable domain id (DDS domain range)
pub const MAX_DOMAIN_ID: DomainId = 232;

struct Subscriber {
    id: SubscriptionId,
    callback: MessageCallback,
}

/// Process-local pub/sub bus for one domain
pub struct InMemoryBus {
    domain_id: DomainId,
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl InMemoryBus {
    /// Create a standalone bus (not registered with any connector)
    pub fn new(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current subscriber count on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Topics with at least one subscriber
    pub fn topics(&self) -> Vec<String> {
        let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics
            .iter()
            .filter(|(_, subs)| !subs.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

impl MessageBus for InMemoryBus {
    fn domain_id(&self) -> DomainId {
        self.domain_id
    }

    fn publish(&self, topic: &str, message: BusMessage) -> Result<(), ContractError> {
        // Snapshot callbacks, then deliver without holding the lock
        let callbacks: Vec<MessageCallback> = {
            let topics = self.topics.read().unwrap_or_else(PoisonError::into_inner);
            topics
                .get(topic)
                .map(|subs| subs.iter().map(|s| Arc::clone(&s.callback)).collect())
                .unwrap_or_default()
        };

        record_bus_publish(topic, message.kind());

        trace!(
            domain_id = self.domain_id,
            topic,
            kind = message.kind(),
            subscribers = callbacks.len(),
            "publish"
        );

        for callback in callbacks {
            callback(&message);
        }
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
    ) -> Result<SubscriptionId, ContractError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, callback });

        debug!(domain_id = self.domain_id, topic, id = id.0, "subscribed");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut topics = self.topics.write().unwrap_or_else(PoisonError::into_inner);
        for subs in topics.values_mut() {
            subs.retain(|s| s.id != id);
        }
    }
}

/// Connector handing out one shared [`InMemoryBus`] per domain
///
/// Cheap to clone; clones share the domain table.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    domains: Arc<Mutex<HashMap<DomainId, Arc<InMemoryBus>>>>,
}

impl InMemoryConnector {
    /// Create an isolated connector (tests, embedding)
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide connector
    pub fn global() -> Self {
        static GLOBAL: OnceLock<InMemoryConnector> = OnceLock::new();
        GLOBAL.get_or_init(InMemoryConnector::new).clone()
    }

    /// Concrete bus for a domain, if already joined
    pub fn domain(&self, domain_id: DomainId) -> Option<Arc<InMemoryBus>> {
        self.domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&domain_id)
            .cloned()
    }
}

impl BusConnector for InMemoryConnector {
    fn connect(&self, domain_id: DomainId) -> Result<Arc<dyn MessageBus>, ContractError> {
        if domain_id > MAX_DOMAIN_ID {
            return Err(ContractError::bus_unreachable(
                domain_id,
                format!("domain id must be <= {MAX_DOMAIN_ID}"),
            ));
        }

        let bus = self
            .domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(domain_id)
            .or_insert_with(|| {
                debug!(domain_id, "in-memory bus domain created");
                Arc::new(InMemoryBus::new(domain_id))
            })
            .clone();

        Ok(bus)
    }
}
