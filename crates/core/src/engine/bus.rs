//! Fan-out of revalidation outcomes to connected clients.
//!
//! Uses a tokio broadcast channel. Sending with nobody subscribed is a no-op,
//! and a subscriber that falls more than `capacity` events behind misses the
//! oldest ones (it observes `RecvError::Lagged`).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BroadcastKind {
    #[serde(rename = "CACHE_UPDATED")]
    Updated,
    #[serde(rename = "CACHE_ERROR")]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastData {
    pub url: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Wire shape: `{ "type": "CACHE_UPDATED" | "CACHE_ERROR", "data": { url, timestamp, error? } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    pub kind: BroadcastKind,
    pub data: BroadcastData,
}

impl BroadcastEvent {
    pub fn updated(url: impl Into<String>, timestamp: i64) -> Self {
        Self { kind: BroadcastKind::Updated, data: BroadcastData { url: url.into(), timestamp, error: None } }
    }

    pub fn failed(url: impl Into<String>, timestamp: i64, error: impl Into<String>) -> Self {
        Self {
            kind: BroadcastKind::Failed,
            data: BroadcastData { url: url.into(), timestamp, error: Some(error.into()) },
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<BroadcastEvent>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver to every live subscriber; returns how many received it.
    pub fn send(&self, event: BroadcastEvent) -> usize {
        let url = event.data.url.clone();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(url = %url, receivers, "broadcast cache event");
                receivers
            }
            Err(_) => {
                tracing::debug!(url = %url, "no subscribers for cache event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
