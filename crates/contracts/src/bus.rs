//! MessageBus trait - publish/subscribe transport abstraction
//!
//! Decouples modules from the concrete transport. The in-memory and no-op
//! backends in the `bus` crate implement the same interface; which one a
//! process uses is chosen by configuration (`dds.backend`).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{BusMessage, ContractError, DomainId};

/// Message delivery callback
///
/// Uses `Arc` so one callback can be registered on several topics.
pub type MessageCallback = Arc<dyn Fn(&BusMessage) + Send + Sync>;

/// Handle returned by `subscribe`, used to detach the callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Topic-based publish/subscribe bus joined for one domain
///
/// # Example
///
/// ```ignore
/// let bus: Arc<dyn MessageBus> = connector.connect(0)?;
/// bus.subscribe("/heartbeat", Arc::new(|msg| println!("{:?}", msg.kind())))?;
/// bus.publish("/heartbeat", BusMessage::Heartbeat(hb))?;
/// ```
pub trait MessageBus: Send + Sync {
    /// Domain this handle is joined to
    fn domain_id(&self) -> DomainId;

    /// Publish one message to every current subscriber of `topic`
    ///
    /// Publishing to a topic with no subscribers succeeds.
    fn publish(&self, topic: &str, message: BusMessage) -> Result<(), ContractError>;

    /// Register a callback on `topic`
    fn subscribe(
        &self,
        topic: &str,
        callback: MessageCallback,
    ) -> Result<SubscriptionId, ContractError>;

    /// Detach a callback; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Joins a bus domain
pub trait BusConnector: Send + Sync {
    /// Connect to `domain_id`
    ///
    /// # Errors
    /// `ContractError::BusUnreachable` if the domain cannot be joined.
    fn connect(&self, domain_id: DomainId) -> Result<Arc<dyn MessageBus>, ContractError>;
}

/// Configured bus backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusBackend {
    /// Process-local topics shared by every module on the same domain
    #[default]
    InMemory,
    /// Accepts everything, delivers nothing
    Noop,
}
