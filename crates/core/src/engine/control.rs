//! Control channel: out-of-band messages from clients.
//!
//! Messages arrive as JSON objects with a `type` discriminator and an
//! optional `data` payload:
//!
//! ```json
//! { "type": "SKIP_WAITING" }
//! { "type": "CACHE_URLS",  "data": { "urls": ["/api/posts"] } }
//! { "type": "CLEAR_CACHE", "data": { "cacheNames": ["v1-api"] } }
//! { "type": "GET_CACHE_INFO" }
//! ```
//!
//! Anything else is logged and dropped. Only `GET_CACHE_INFO` replies, on the
//! port handed in alongside the message.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use super::{Engine, FetchMode};
use crate::Error;
use crate::cache::CacheKey;
use crate::partition::PartitionKind;

/// Where the reply to an introspection request goes.
pub type ReplyPort = oneshot::Sender<CacheInfo>;

const SKIP_WAITING: &str = "SKIP_WAITING";
const CACHE_URLS: &str = "CACHE_URLS";
const CLEAR_CACHE: &str = "CLEAR_CACHE";
const GET_CACHE_INFO: &str = "GET_CACHE_INFO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    ForceActivate,
    Preload { urls: Vec<String> },
    /// Empty means every partition of the current version.
    Clear { partitions: Vec<String> },
    Introspect,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("message is not an object with a string `type`")]
    Malformed,

    #[error("unknown message type {0:?}")]
    Unknown(String),

    #[error("invalid data for {kind}: {reason}")]
    InvalidData { kind: String, reason: String },
}

impl From<MessageError> for Error {
    fn from(err: MessageError) -> Self {
        Error::InvalidMessage(err.to_string())
    }
}

#[derive(Deserialize)]
struct PreloadData {
    urls: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ClearData {
    #[serde(default)]
    cache_names: Option<Vec<String>>,
}

impl ControlMessage {
    pub fn from_value(value: &Value) -> Result<Self, MessageError> {
        let kind = value.get("type").and_then(Value::as_str).ok_or(MessageError::Malformed)?;
        let data = value.get("data").filter(|d| !d.is_null());

        let invalid = |e: serde_json::Error| MessageError::InvalidData { kind: kind.to_string(), reason: e.to_string() };

        match kind {
            SKIP_WAITING => Ok(Self::ForceActivate),
            CACHE_URLS => {
                let data = data.ok_or_else(|| MessageError::InvalidData {
                    kind: kind.to_string(),
                    reason: "missing data.urls".into(),
                })?;
                let PreloadData { urls } = PreloadData::deserialize(data).map_err(invalid)?;
                Ok(Self::Preload { urls })
            }
            CLEAR_CACHE => {
                let data = match data {
                    Some(d) => ClearData::deserialize(d).map_err(invalid)?,
                    None => ClearData::default(),
                };
                Ok(Self::Clear { partitions: data.cache_names.unwrap_or_default() })
            }
            GET_CACHE_INFO => Ok(Self::Introspect),
            other => Err(MessageError::Unknown(other.to_string())),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::ForceActivate => json!({ "type": SKIP_WAITING }),
            Self::Preload { urls } => json!({ "type": CACHE_URLS, "data": { "urls": urls } }),
            Self::Clear { partitions } => json!({ "type": CLEAR_CACHE, "data": { "cacheNames": partitions } }),
            Self::Introspect => json!({ "type": GET_CACHE_INFO }),
        }
    }
}

/// One item that could not be processed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Failure {
    pub target: String,
    pub error: String,
}

impl Failure {
    pub fn new(target: impl Into<String>, error: impl ToString) -> Self {
        Self { target: target.into(), error: error.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PreloadReport {
    pub cached: Vec<String>,
    pub failed: Vec<Failure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClearReport {
    pub deleted: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<Failure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PartitionInfo {
    pub size: usize,
    pub urls: Vec<String>,
}

/// Reply to `GET_CACHE_INFO`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CacheInfo {
    pub version: String,
    pub caches: BTreeMap<String, PartitionInfo>,
    pub timestamp: i64,
}

impl Engine {
    /// Message hook. Malformed and unknown messages are logged and ignored.
    pub async fn handle_message(&self, message: &Value, reply: Option<ReplyPort>) {
        match ControlMessage::from_value(message) {
            Ok(parsed) => self.dispatch(parsed, reply).await,
            Err(e) => tracing::warn!(error = %e, "ignoring control message"),
        }
    }

    pub async fn dispatch(&self, message: ControlMessage, reply: Option<ReplyPort>) {
        match message {
            ControlMessage::ForceActivate => self.force_activate(),
            ControlMessage::Preload { urls } => {
                let report = self.preload(&urls).await;
                tracing::info!(cached = report.cached.len(), failed = report.failed.len(), "preload finished");
            }
            ControlMessage::Clear { partitions } => {
                let report = self.clear(&partitions).await;
                tracing::info!(deleted = ?report.deleted, missing = ?report.missing, failed = report.failed.len(), "clear finished");
            }
            ControlMessage::Introspect => {
                let info = self.introspect().await;
                match reply {
                    Some(port) => {
                        if port.send(info).is_err() {
                            tracing::debug!("introspection requester went away");
                        }
                    }
                    None => tracing::warn!("introspection requested without a reply port"),
                }
            }
        }
    }

    /// Ask the host to activate this version immediately.
    pub fn force_activate(&self) {
        self.host.skip_waiting();
    }

    /// Fetch `urls` concurrently into the api partition.
    ///
    /// Individual failures are reported, never fatal to the batch.
    pub async fn preload(&self, urls: &[String]) -> PreloadReport {
        let partition = self.settings.partitions.get(PartitionKind::Api);
        let store = self.db.partition(partition.name.as_str());
        let mut report = PreloadReport::default();

        let mut join_set = JoinSet::new();
        for (index, raw) in urls.iter().enumerate() {
            let url = match self.settings.resolve(raw) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(url = %raw, error = %e, "skipping unparsable preload url");
                    report.failed.push(Failure::new(raw.as_str(), e));
                    continue;
                }
            };
            let engine = self.clone();
            let store = store.clone();
            join_set.spawn(async move {
                let key = CacheKey::get(&url);
                let outcome = match engine.fetch_network(&url, FetchMode::Default).await {
                    Ok(response) if response.is_ok() => match engine.try_write_through(&store, &key, &response).await {
                        Ok(true) => Ok(()),
                        Ok(false) => Err("cache write rejected: a newer entry is stored".to_string()),
                        Err(e) => Err(e.to_string()),
                    },
                    Ok(response) => Err(format!("HTTP {}", response.status)),
                    Err(e) => Err(e.to_string()),
                };
                (index, url.to_string(), outcome)
            });
        }

        let mut cached = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, url, Ok(()))) => cached.push((index, url)),
                Ok((_, url, Err(error))) => {
                    tracing::warn!(url = %url, error = %error, "preload failed");
                    report.failed.push(Failure::new(url, error));
                }
                Err(e) => tracing::warn!(error = %e, "preload task did not complete"),
            }
        }
        cached.sort_by_key(|(index, _)| *index);
        report.cached = cached.into_iter().map(|(_, url)| url).collect();
        report
    }

    /// Delete the named partitions, or every current partition when `names` is empty.
    pub async fn clear(&self, names: &[String]) -> ClearReport {
        let names = if names.is_empty() { self.settings.partitions.expected_names() } else { names.to_vec() };
        let mut report = ClearReport::default();

        for name in names {
            match self.db.delete_partition(&name).await {
                Ok(true) => report.deleted.push(name),
                Ok(false) => report.missing.push(name),
                Err(e) => {
                    tracing::warn!(partition = %name, error = %e, "failed to clear partition");
                    report.failed.push(Failure::new(name, e));
                }
            }
        }
        report
    }

    /// Snapshot of every persisted partition belonging to this version.
    pub async fn introspect(&self) -> CacheInfo {
        let mut caches = BTreeMap::new();

        let names = match self.db.partition_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate partitions");
                Vec::new()
            }
        };

        for name in names.into_iter().filter(|n| self.settings.partitions.is_expected(n)) {
            match self.db.partition(name.as_str()).keys().await {
                Ok(urls) => {
                    caches.insert(name, PartitionInfo { size: urls.len(), urls });
                }
                Err(e) => tracing::warn!(partition = %name, error = %e, "failed to list partition"),
            }
        }

        CacheInfo { version: self.settings.partitions.version().to_string(), caches, timestamp: Self::now_ms() }
    }
}
