//! Control channel tools.
//!
//! One tool per control message, plus `post_message` which accepts the raw
//! wire shape and dispatches it on the engine.

use netstash_core::engine::ControlMessage;
use netstash_core::{Engine, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use super::json_result;

/// Parameters for the cache_urls tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheUrlsParams {
    /// URLs to fetch into the api partition. Relative URLs resolve against the origin.
    pub urls: Vec<String>,
}

/// Parameters for the clear_cache tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClearCacheParams {
    /// Partition names to delete. Omit to clear every partition of the current version.
    #[serde(default)]
    pub cache_names: Option<Vec<String>>,
}

/// Parameters for the post_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostMessageParams {
    /// A control message, e.g. `{"type": "GET_CACHE_INFO"}`.
    pub message: Value,
}

pub async fn skip_waiting_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    engine.force_activate();
    json_result(&json!({ "skip_waiting": true }))
}

pub async fn cache_urls_impl(engine: &Engine, params: CacheUrlsParams) -> Result<CallToolResult, McpError> {
    if params.urls.is_empty() {
        return Err(Error::InvalidInput("urls cannot be empty".into()).into());
    }
    json_result(&engine.preload(&params.urls).await)
}

pub async fn clear_cache_impl(engine: &Engine, params: ClearCacheParams) -> Result<CallToolResult, McpError> {
    let names = params.cache_names.unwrap_or_default();
    json_result(&engine.clear(&names).await)
}

pub async fn cache_info_impl(engine: &Engine) -> Result<CallToolResult, McpError> {
    json_result(&engine.introspect().await)
}

/// Deliver a raw control message.
///
/// Unlike the engine hook, which drops bad messages silently, the tool
/// reports them to the caller.
pub async fn post_message_impl(engine: &Engine, params: PostMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::from_value(&params.message).map_err(Error::from)?;
    let (tx, rx) = oneshot::channel();

    engine.dispatch(message.clone(), Some(tx)).await;

    match rx.await {
        Ok(info) => json_result(&info),
        Err(_) => json_result(&json!({ "delivered": message.to_value()["type"] })),
    }
}
