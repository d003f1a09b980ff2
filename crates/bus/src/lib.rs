//! # Bus
//!
//! Publish/subscribe backends behind [`contracts::MessageBus`].
//!
//! - [`InMemoryBus`] / [`InMemoryConnector`]: process-local topics per domain
//! - [`NoopBus`] / [`NoopConnector`]: accepts everything, delivers nothing
//! - [`subscribe_channel`]: consume a topic through a bounded channel
//!
//! [`connector_for`] picks a connector from the configured [`BusBackend`].

mod channel;
mod memory;
mod noop;

use std::sync::Arc;

use contracts::{BusBackend, BusConnector};

pub use channel::{subscribe_channel, ChannelSubscription};
pub use memory::{InMemoryBus, InMemoryConnector, MAX_DOMAIN_ID};
pub use noop::{NoopBus, NoopConnector};

/// Connector for a configured backend
///
/// `InMemory` returns the process-wide connector, so every module built in
/// this process shares topics per domain.
pub fn connector_for(backend: BusBackend) -> Arc<dyn BusConnector> {
    match backend {
        BusBackend::InMemory => Arc::new(InMemoryConnector::global()),
        BusBackend::Noop => Arc::new(NoopConnector),
    }
}
