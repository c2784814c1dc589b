//! MCP tool implementations.
//!
//! This module contains all tools exposed by the netstash server.

pub mod control;
pub mod proxy;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub use control::{CacheUrlsParams, ClearCacheParams, PostMessageParams};
pub use proxy::{ProxyFetchOutput, ProxyFetchParams};

/// Wrap a serializable value as a pretty-printed JSON text result.
pub(crate) fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| netstash_core::Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use netstash_core::engine::{FetchMode, FixedRandom};
    use netstash_core::{AppConfig, CacheDb, Engine, EngineSettings, Error, Fetch, HttpResponse};
    use rmcp::model::CallToolResult;
    use url::Url;

    /// Origin that answers a fixed set of paths and refuses everything else.
    #[derive(Default)]
    pub(crate) struct ScriptedOrigin {
        pub(crate) routes: HashMap<String, HttpResponse>,
    }

    #[async_trait]
    impl Fetch for ScriptedOrigin {
        async fn fetch(&self, url: &Url, _mode: FetchMode) -> Result<HttpResponse, Error> {
            self.routes
                .get(url.path())
                .cloned()
                .ok_or_else(|| Error::Network(format!("connection refused: {url}")))
        }
    }

    pub(crate) async fn engine(routes: &[(&str, &str)]) -> Engine {
        let origin = ScriptedOrigin {
            routes: routes
                .iter()
                .map(|(path, body)| (path.to_string(), HttpResponse::new(200, "OK", body.to_string())))
                .collect(),
        };
        let config = AppConfig { origin: "https://example.com".into(), ..Default::default() };
        let settings = EngineSettings::from_config(&config).unwrap();
        let db = CacheDb::open_in_memory().await.unwrap();
        Engine::builder(settings, db, Arc::new(origin)).random(Arc::new(FixedRandom(1.0))).build()
    }

    pub(crate) fn text(result: &CallToolResult) -> String {
        result.content[0].as_text().unwrap().text.clone()
    }

    pub(crate) fn json(result: &CallToolResult) -> serde_json::Value {
        serde_json::from_str(&text(result)).unwrap()
    }
}
