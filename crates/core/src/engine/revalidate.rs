//! Background revalidation of fresh API entries.

use super::{BroadcastEvent, Engine, FetchMode};
use crate::cache::{CacheKey, PartitionStore};

impl Engine {
    /// Refresh `key` on the background sink without blocking the caller.
    pub fn schedule_revalidation(&self, store: PartitionStore, key: CacheKey) {
        let engine = self.clone();
        self.background.spawn(async move {
            engine.revalidate(&store, &key).await;
        });
    }

    /// Refetch one entry, replace it on success, and broadcast the outcome.
    ///
    /// On failure the existing entry is left as it was.
    pub async fn revalidate(&self, store: &PartitionStore, key: &CacheKey) -> BroadcastEvent {
        let url = key.url().to_string();

        let event = match self.fetch_network(key.url(), FetchMode::Default).await {
            Ok(response) if response.is_ok() => {
                self.write_through(store, key, &response).await;
                BroadcastEvent::updated(url, Self::now_ms())
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = response.status, "revalidation got an error status");
                BroadcastEvent::failed(url, Self::now_ms(), format!("HTTP {}", response.status))
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "revalidation failed");
                BroadcastEvent::failed(url, Self::now_ms(), e.to_string())
            }
        };

        self.bus.send(event.clone());
        event
    }
}
