//! Cache orchestration engine.
//!
//! The [`Engine`] decides, per intercepted request, whether to answer from a
//! partition, from the network, or both. It is assembled from:
//!
//! - an immutable [`EngineSettings`] compiled once from [`AppConfig`]
//! - the shared [`CacheDb`] holding every partition
//! - a [`Fetch`] implementation for the origin
//! - a [`Host`] for the activation shortcuts
//! - a [`RandomSource`] for the probabilistic revalidation trigger
//! - a [`BroadcastBus`] and [`BackgroundTasks`] sink for revalidation
//!
//! Every seam is injectable so the engine runs without a real host or network.

pub mod background;
pub mod bus;
pub mod control;
pub mod host;
pub mod lifecycle;
pub mod network;
pub mod random;
pub mod revalidate;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::Error;
use crate::cache::{CacheDb, CacheKey, CachedEntry, PartitionStore};
use crate::classify::Classifier;
use crate::config::{AppConfig, ConfigError};
use crate::http::{HttpResponse, InboundRequest};
use crate::partition::PartitionTable;
use crate::urls::{self, UrlError};

pub use background::BackgroundTasks;
pub use bus::{BroadcastBus, BroadcastEvent, BroadcastKind};
pub use control::{CacheInfo, ClearReport, ControlMessage, Failure, MessageError, PartitionInfo, PreloadReport, ReplyPort};
pub use host::{CacheHooks, Host, LocalHost};
pub use lifecycle::{ActivationReport, InstallReport};
pub use network::{Fetch, FetchMode};
pub use random::{FixedRandom, RandomSource, ThreadRandom};

/// Runtime tables derived from configuration. Never mutated after startup.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub origin: Url,
    pub partitions: PartitionTable,
    pub classifier: Classifier,
    /// Install manifest, as written in configuration (may be origin-relative).
    pub precache: Vec<String>,
    pub fetch_timeout: Duration,
    pub revalidate_probability: f64,
    pub broadcast_capacity: usize,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let origin = urls::canonicalize(&config.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;

        Ok(Self {
            origin,
            partitions: PartitionTable::new(&config.version, &config.ttl),
            classifier: Classifier::new(&config.routes)?,
            precache: config.precache.clone(),
            fetch_timeout: config.timeout(),
            revalidate_probability: config.revalidate_probability,
            broadcast_capacity: config.broadcast_capacity,
        })
    }

    /// Resolve a possibly origin-relative URL.
    pub fn resolve(&self, input: &str) -> Result<Url, UrlError> {
        urls::resolve(&self.origin, input)
    }
}

/// The cache engine. Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Engine {
    settings: Arc<EngineSettings>,
    db: CacheDb,
    network: Arc<dyn Fetch>,
    host: Arc<dyn Host>,
    random: Arc<dyn RandomSource>,
    bus: BroadcastBus,
    background: BackgroundTasks,
}

/// Builder for [`Engine`]; unset seams get production defaults.
pub struct EngineBuilder {
    settings: EngineSettings,
    db: CacheDb,
    network: Arc<dyn Fetch>,
    host: Option<Arc<dyn Host>>,
    random: Option<Arc<dyn RandomSource>>,
    background: Option<BackgroundTasks>,
}

impl EngineBuilder {
    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = Some(random);
        self
    }

    pub fn background(mut self, background: BackgroundTasks) -> Self {
        self.background = Some(background);
        self
    }

    pub fn build(self) -> Engine {
        let bus = BroadcastBus::new(self.settings.broadcast_capacity);
        Engine {
            settings: Arc::new(self.settings),
            db: self.db,
            network: self.network,
            host: self.host.unwrap_or_else(|| Arc::new(LocalHost::new())),
            random: self.random.unwrap_or_else(|| Arc::new(ThreadRandom)),
            bus,
            background: self.background.unwrap_or_default(),
        }
    }
}

impl Engine {
    pub fn builder(settings: EngineSettings, db: CacheDb, network: Arc<dyn Fetch>) -> EngineBuilder {
        EngineBuilder { settings, db, network, host: None, random: None, background: None }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    pub fn bus(&self) -> &BroadcastBus {
        &self.bus
    }

    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }

    pub(crate) fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// One bounded network round trip. Never retried.
    pub(crate) async fn fetch_network(&self, url: &Url, mode: FetchMode) -> Result<HttpResponse, Error> {
        let timeout = self.settings.fetch_timeout;
        match tokio::time::timeout(timeout, self.network.fetch(url, mode)).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(format!("{url} did not respond within {}ms", timeout.as_millis()))),
        }
    }

    /// Read an entry, treating store failures as a miss.
    pub(crate) async fn lookup(&self, store: &PartitionStore, key: &CacheKey) -> Option<CachedEntry> {
        match store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(partition = store.name(), url = %key.url(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Stamp and persist an ok response. Returns whether it was stored.
    ///
    /// The caller keeps `response` untouched; only the stored copy carries
    /// `stored-at`. Store failures are logged and reported as not stored.
    pub(crate) async fn write_through(&self, store: &PartitionStore, key: &CacheKey, response: &HttpResponse) -> bool {
        self.try_write_through(store, key, response).await.unwrap_or(false)
    }

    /// Like [`Engine::write_through`], but hands store errors back to the caller.
    pub(crate) async fn try_write_through(
        &self, store: &PartitionStore, key: &CacheKey, response: &HttpResponse,
    ) -> Result<bool, Error> {
        if !response.is_ok() {
            return Ok(false);
        }
        let entry = CachedEntry::stamp(response, Self::now_ms());
        match store.put(key, &entry).await {
            Ok(applied) => {
                tracing::debug!(partition = store.name(), url = %key.url(), applied, "write-through");
                Ok(applied)
            }
            Err(e) => {
                tracing::warn!(partition = store.name(), url = %key.url(), error = %e, "cache write failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl CacheHooks for Engine {
    async fn on_install(&self) -> Result<InstallReport, Error> {
        self.install().await
    }

    async fn on_activate(&self) -> Result<ActivationReport, Error> {
        self.activate().await
    }

    async fn on_fetch(&self, request: &InboundRequest) -> Option<HttpResponse> {
        self.handle_fetch(request).await
    }

    async fn on_message(&self, message: &Value, reply: Option<ReplyPort>) {
        self.handle_message(message, reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{StubNetwork, engine_with, ok, settings, url};
    use super::*;

    #[test]
    fn test_settings_from_default_config() {
        let settings = EngineSettings::from_config(&AppConfig::default()).unwrap();
        assert_eq!(settings.origin.as_str(), "http://localhost:8080/");
        assert_eq!(settings.partitions.version(), "v1");
        assert_eq!(settings.fetch_timeout, Duration::from_millis(20_000));
    }

    #[test]
    fn test_settings_resolve() {
        let settings = settings();
        assert_eq!(settings.resolve("/blog").unwrap().as_str(), "https://example.com/blog");
        assert!(settings.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_fetch_network_times_out() {
        let network = StubNetwork::new();
        network.hang("/slow");
        let (engine, _host) = engine_with(network.clone(), 1.0).await;

        let result = engine.fetch_network(&url("/slow"), FetchMode::Default).await;
        assert!(matches!(result, Err(Error::FetchTimeout(_))));
    }

    #[tokio::test]
    async fn test_write_through_skips_non_ok() {
        let network = StubNetwork::new();
        let (engine, _host) = engine_with(network, 1.0).await;
        let store = engine.db().partition("v1-api");
        let key = CacheKey::get(&url("/api/posts"));

        assert!(!engine.write_through(&store, &key, &HttpResponse::new(500, "Internal Server Error", "")).await);
        assert!(store.get(&key).await.unwrap().is_none());

        assert!(engine.write_through(&store, &key, &ok("fresh")).await);
        assert!(store.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_try_write_through_surfaces_store_errors() {
        let network = StubNetwork::new();
        let (engine, _host) = engine_with(network, 1.0).await;
        engine.db().conn.call(|conn| conn.execute_batch("DROP TABLE entries")).await.unwrap();
        let store = engine.db().partition("v1-api");
        let key = CacheKey::get(&url("/api/posts"));

        assert!(matches!(engine.try_write_through(&store, &key, &ok("fresh")).await, Err(Error::Database(_))));
        assert!(!engine.write_through(&store, &key, &ok("fresh")).await);
    }
}
