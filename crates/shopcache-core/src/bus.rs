//! Invalidation bus for snapshot change notifications.
//!
//! Every successful mutation publishes the fresh snapshot under a topic key.
//! Consumers holding a derived page subscribe to that key and re-derive the
//! whole page from the published snapshot - partial patching of derived
//! results is never done, so views cannot drift from the cache.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::Snapshot;

/// Topic key for product catalog invalidations.
pub const PRODUCTS_TOPIC: &str = "products";

/// Buffered invalidations per subscriber. A lagged subscriber only ever
/// cares about the freshest snapshot, so a small buffer is enough.
const CHANNEL_CAPACITY: usize = 16;

/// Keyed fan-out of snapshot invalidations.
pub struct InvalidationBus {
    topics: Mutex<HashMap<String, broadcast::Sender<Snapshot>>>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Snapshot> {
        let mut topics = self.topics.lock().expect("bus lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to invalidations for `topic`.
    pub fn subscribe(&self, topic: &str) -> Invalidations {
        Invalidations {
            rx: self.sender(topic).subscribe(),
        }
    }

    /// Publish a fresh snapshot to every subscriber of `topic`.
    pub fn publish(&self, topic: &str, snapshot: Snapshot) {
        let receivers = self.sender(topic).send(snapshot).unwrap_or(0);
        debug!(topic, receivers, "Published snapshot invalidation");
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription handle. Dropping it ends the subscription.
pub struct Invalidations {
    rx: broadcast::Receiver<Snapshot>,
}

impl Invalidations {
    /// Wait for the next invalidation. Returns `None` once the bus is gone.
    /// A subscriber that fell behind skips ahead - only fresh snapshots are
    /// worth re-deriving from.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll for a pending invalidation.
    pub fn try_recv(&mut self) -> Option<Snapshot> {
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
