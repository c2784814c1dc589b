//! Per-partition serving strategies.
//!
//! Every classified request produces a response. Network failures are caught
//! here and turned into a cache fallback or a surrogate; they are never
//! retried and never escape to the caller.

use super::{Engine, FetchMode};
use crate::cache::{CacheKey, PartitionStore};
use crate::freshness::is_fresh;
use crate::http::{HttpResponse, InboundRequest};
use crate::partition::{Partition, Strategy};

impl Engine {
    /// Fetch hook: classify and serve, or `None` to pass the request through.
    pub async fn handle_fetch(&self, request: &InboundRequest) -> Option<HttpResponse> {
        let kind = self.settings.classifier.classify(request)?;
        let partition = self.settings.partitions.get(kind);
        Some(self.serve(partition, request).await)
    }

    /// Serve `request` from `partition` using the partition's strategy.
    pub async fn serve(&self, partition: &Partition, request: &InboundRequest) -> HttpResponse {
        let store = self.db.partition(partition.name.as_str());
        let key = CacheKey::from_request(request);

        tracing::debug!(partition = %partition.name, url = %key.url(), strategy = ?partition.strategy, "serving request");

        match partition.strategy {
            Strategy::CacheFirst => self.cache_first(&store, &key).await,
            Strategy::NetworkFirst => self.network_first(&store, &key).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(&store, &key, partition.ttl_ms).await,
        }
    }

    async fn cache_first(&self, store: &PartitionStore, key: &CacheKey) -> HttpResponse {
        if let Some(entry) = self.lookup(store, key).await {
            tracing::debug!(url = %key.url(), "cache hit");
            return entry.to_response();
        }

        match self.fetch_network(key.url(), FetchMode::Default).await {
            Ok(response) => {
                self.write_through(store, key, &response).await;
                response
            }
            Err(e) => {
                tracing::warn!(url = %key.url(), error = %e, "asset fetch failed, returning 404");
                HttpResponse::not_found()
            }
        }
    }

    async fn network_first(&self, store: &PartitionStore, key: &CacheKey) -> HttpResponse {
        match self.fetch_network(key.url(), FetchMode::Default).await {
            Ok(response) => {
                self.write_through(store, key, &response).await;
                response
            }
            Err(e) => {
                tracing::warn!(url = %key.url(), error = %e, "page fetch failed, trying cache");
                match self.lookup(store, key).await {
                    Some(entry) => entry.to_response(),
                    None => HttpResponse::page_unavailable(),
                }
            }
        }
    }

    async fn stale_while_revalidate(&self, store: &PartitionStore, key: &CacheKey, ttl_ms: u64) -> HttpResponse {
        let cached = self.lookup(store, key).await;

        if let Some(entry) = &cached
            && is_fresh(entry, ttl_ms, Self::now_ms())
        {
            if self.random.sample() < self.settings.revalidate_probability {
                tracing::debug!(url = %key.url(), "fresh hit, scheduling background revalidation");
                self.schedule_revalidation(store.clone(), key.clone());
            } else {
                tracing::debug!(url = %key.url(), "fresh hit");
            }
            return entry.to_response();
        }

        let outcome = self.fetch_network(key.url(), FetchMode::Default).await;
        match outcome {
            Ok(response) if response.is_ok() => {
                self.write_through(store, key, &response).await;
                response
            }
            Ok(response) => {
                tracing::warn!(url = %key.url(), status = response.status, "api returned an error status");
                fallback_or_unavailable(cached)
            }
            Err(e) => {
                tracing::warn!(url = %key.url(), error = %e, "api fetch failed");
                fallback_or_unavailable(cached)
            }
        }
    }
}

fn fallback_or_unavailable(cached: Option<crate::cache::CachedEntry>) -> HttpResponse {
    match cached {
        Some(entry) => {
            tracing::debug!("serving stale entry");
            entry.to_response()
        }
        None => HttpResponse::api_unavailable(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{StubNetwork, engine_with, ok, url};
    use super::*;
    use crate::cache::{CachedEntry, STORED_AT_HEADER};
    use crate::partition::PartitionKind;

    const MINUTE: i64 = 60_000;

    async fn seed(engine: &Engine, kind: PartitionKind, path: &str, body: &str, stored_at: i64) {
        let name = engine.settings().partitions.get(kind).name.clone();
        engine
            .db()
            .partition(name)
            .put(&CacheKey::get(&url(path)), &CachedEntry::stamp(&ok(body), stored_at))
            .await
            .unwrap();
    }

    async fn stored(engine: &Engine, kind: PartitionKind, path: &str) -> Option<CachedEntry> {
        let name = engine.settings().partitions.get(kind).name.clone();
        engine.db().partition(name).get(&CacheKey::get(&url(path))).await.unwrap()
    }

    #[tokio::test]
    async fn test_unclassified_passes_through() {
        let network = StubNetwork::new();
        let (engine, _host) = engine_with(network.clone(), 1.0).await;

        let post = InboundRequest::new("POST", url("/api/posts"));
        assert!(engine.handle_fetch(&post).await.is_none());

        let pdf = InboundRequest::get(url("/files/report.pdf"));
        assert!(engine.handle_fetch(&pdf).await.is_none());
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let network = StubNetwork::new();
        network.respond("/static/app.css", ok("network"));
        let (engine, _host) = engine_with(network.clone(), 1.0).await;
        seed(&engine, PartitionKind::Static, "/static/app.css", "cached", 0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/static/app.css"))).await.unwrap();

        assert_eq!(response.body, "cached");
        assert_eq!(response.header(STORED_AT_HEADER), None);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_writes_through() {
        let network = StubNetwork::new();
        network.respond("/img/cover.png", ok("png"));
        let (engine, _host) = engine_with(network.clone(), 1.0).await;

        let first = engine.handle_fetch(&InboundRequest::get(url("/img/cover.png"))).await.unwrap();
        assert_eq!(first, ok("png"));

        let second = engine.handle_fetch(&InboundRequest::get(url("/img/cover.png"))).await.unwrap();
        assert_eq!(second, ok("png"));
        assert_eq!(network.calls_for("/img/cover.png"), 1);
        assert!(stored(&engine, PartitionKind::Image, "/img/cover.png").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_first_network_error_is_404() {
        let network = StubNetwork::new();
        network.fail("/static/app.js", "offline");
        let (engine, _host) = engine_with(network, 1.0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/static/app.js"))).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_cache_first_error_status_is_not_cached() {
        let network = StubNetwork::new();
        network.respond("/static/missing.css", HttpResponse::new(404, "Not Found", "nope"));
        let (engine, _host) = engine_with(network.clone(), 1.0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/static/missing.css"))).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body, "nope");
        assert!(stored(&engine, PartitionKind::Static, "/static/missing.css").await.is_none());
    }

    #[tokio::test]
    async fn test_network_first_prefers_network() {
        let network = StubNetwork::new();
        network.respond("/blog/hello", ok("fresh page"));
        let (engine, _host) = engine_with(network.clone(), 1.0).await;
        seed(&engine, PartitionKind::Page, "/blog/hello", "old page", Engine::now_ms()).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/blog/hello"))).await.unwrap();

        assert_eq!(response.body, "fresh page");
        let entry = stored(&engine, PartitionKind::Page, "/blog/hello").await.unwrap();
        assert_eq!(entry.stored().body, "fresh page");
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let network = StubNetwork::new();
        network.fail("/blog/hello", "offline");
        let (engine, _host) = engine_with(network, 1.0).await;
        seed(&engine, PartitionKind::Page, "/blog/hello", "old page", 0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/blog/hello"))).await.unwrap();
        assert_eq!(response.body, "old page");
        assert_eq!(response.header(STORED_AT_HEADER), None);
    }

    #[tokio::test]
    async fn test_network_first_offline_surrogate() {
        let network = StubNetwork::new();
        network.fail("/blog/hello", "offline");
        let (engine, _host) = engine_with(network, 1.0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/blog/hello"))).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.body, "Page not available offline");
    }

    #[tokio::test]
    async fn test_network_first_timeout_falls_back() {
        let network = StubNetwork::new();
        network.hang("/blog");
        let (engine, _host) = engine_with(network, 1.0).await;
        seed(&engine, PartitionKind::Page, "/blog", "cached index", 0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/blog"))).await.unwrap();
        assert_eq!(response.body, "cached index");
    }

    #[tokio::test]
    async fn test_swr_fresh_hit_without_revalidation() {
        let network = StubNetwork::new();
        network.respond("/api/posts", ok("network"));
        let (engine, _host) = engine_with(network.clone(), 0.5).await;
        seed(&engine, PartitionKind::Api, "/api/posts", "cached", Engine::now_ms() - 2 * MINUTE).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();
        engine.background().drain().await;

        assert_eq!(response.body, "cached");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_swr_draw_equal_to_probability_skips_revalidation() {
        let network = StubNetwork::new();
        network.respond("/api/posts", ok("network"));
        let (engine, _host) = engine_with(network.clone(), 0.1).await;
        assert_eq!(engine.settings().revalidate_probability, 0.1);
        seed(&engine, PartitionKind::Api, "/api/posts", "cached", Engine::now_ms() - 2 * MINUTE).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();
        engine.background().drain().await;

        assert_eq!(response.body, "cached");
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_swr_fresh_hit_with_forced_revalidation() {
        let network = StubNetwork::new();
        network.respond("/api/posts", ok("network"));
        let (engine, _host) = engine_with(network.clone(), 0.05).await;
        let mut events = engine.bus().subscribe();
        seed(&engine, PartitionKind::Api, "/api/posts", "cached", Engine::now_ms() - 2 * MINUTE).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();
        assert_eq!(response.body, "cached");

        engine.background().drain().await;
        assert_eq!(network.calls_for("/api/posts"), 1);
        let entry = stored(&engine, PartitionKind::Api, "/api/posts").await.unwrap();
        assert_eq!(entry.stored().body, "network");
        assert_eq!(events.recv().await.unwrap().kind, super::super::BroadcastKind::Updated);
    }

    #[tokio::test]
    async fn test_swr_stale_fetches_and_writes() {
        let network = StubNetwork::new();
        network.respond("/api/posts", ok("network"));
        let (engine, _host) = engine_with(network.clone(), 1.0).await;
        seed(&engine, PartitionKind::Api, "/api/posts", "cached", Engine::now_ms() - 10 * MINUTE).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();

        assert_eq!(response.body, "network");
        assert_eq!(network.calls(), 1);
        let entry = stored(&engine, PartitionKind::Api, "/api/posts").await.unwrap();
        assert_eq!(entry.stored().body, "network");
    }

    #[tokio::test]
    async fn test_swr_stale_fallback_on_failure() {
        let network = StubNetwork::new();
        network.fail("/api/posts", "offline");
        let (engine, _host) = engine_with(network, 1.0).await;
        seed(&engine, PartitionKind::Api, "/api/posts", "stale", 0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();
        assert_eq!(response.body, "stale");
    }

    #[tokio::test]
    async fn test_swr_error_status_keeps_cached_entry() {
        let network = StubNetwork::new();
        network.respond("/api/posts", HttpResponse::new(500, "Internal Server Error", "oops"));
        let (engine, _host) = engine_with(network, 1.0).await;
        seed(&engine, PartitionKind::Api, "/api/posts", "stale", 0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();
        assert_eq!(response.body, "stale");
        let entry = stored(&engine, PartitionKind::Api, "/api/posts").await.unwrap();
        assert_eq!(entry.stored().body, "stale");
    }

    #[tokio::test]
    async fn test_swr_offline_surrogate_is_json() {
        let network = StubNetwork::new();
        network.fail("/api/posts", "offline");
        let (engine, _host) = engine_with(network, 1.0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/posts"))).await.unwrap();
        assert_eq!(response.status, 503);
        assert_eq!(response.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "Content not available offline");
    }

    #[tokio::test]
    async fn test_write_through_returns_unstamped_response() {
        let network = StubNetwork::new();
        network.respond("/api/categories", ok("[]"));
        let (engine, _host) = engine_with(network, 1.0).await;

        let response = engine.handle_fetch(&InboundRequest::get(url("/api/categories"))).await.unwrap();
        assert_eq!(response.header(STORED_AT_HEADER), None);

        let entry = stored(&engine, PartitionKind::Api, "/api/categories").await.unwrap();
        assert!(entry.stored().header(STORED_AT_HEADER).is_some());
    }
}
