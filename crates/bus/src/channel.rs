//! Callback → channel adapter
//!
//! Turns a bus subscription into a bounded `async_channel` receiver, so a
//! consumer can `recv().await` instead of running inside the publisher's
//! callback. When the channel is full the incoming message is dropped
//! (drop-newest) and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, TryRecvError, TrySendError};
use contracts::{BusMessage, ContractError, MessageBus, SubscriptionId};
use observability::metrics::record_channel_dropped;

/// A subscription delivering into a bounded channel
///
/// Dropping it detaches the callback from the bus.
pub struct ChannelSubscription {
    bus: Arc<dyn MessageBus>,
    id: SubscriptionId,
    topic: String,
    rx: Receiver<BusMessage>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSubscription {
    /// Topic this subscription listens on
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next message
    pub async fn recv(&self) -> Option<BusMessage> {
        self.rx.recv().await.ok()
    }

    /// Next message if one is queued
    pub fn try_recv(&self) -> Option<BusMessage> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => None,
        }
    }

    /// Take everything currently queued
    pub fn drain(&self) -> Vec<BusMessage> {
        let mut out = Vec::with_capacity(self.rx.len());
        while let Some(msg) = self.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Queued message count
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Messages discarded because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Underlying receiver (for `select!` style consumers)
    pub fn receiver(&self) -> &Receiver<BusMessage> {
        &self.rx
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

/// Subscribe `topic` into a channel of `capacity` (at least 1)
pub fn subscribe_channel(
    bus: &Arc<dyn MessageBus>,
    topic: &str,
    capacity: usize,
) -> Result<ChannelSubscription, ContractError> {
    let (tx, rx) = async_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    let dropped_cb = dropped.clone();
    let topic_label = topic.to_string();
    let id = bus.subscribe(
        topic,
        Arc::new(move |msg: &BusMessage| match tx.try_send(msg.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                dropped_cb.fetch_add(1, Ordering::Relaxed);
                record_channel_dropped(&topic_label);
            }
            // Receiver gone; the subscription is being torn down
            Err(TrySendError::Closed(_)) => {}
        }),
    )?;

    Ok(ChannelSubscription {
        bus: bus.clone(),
        id,
        topic: topic.to_string(),
        rx,
        dropped,
    })
}
