//! proxy_fetch tool implementation.
//!
//! Runs a request through the engine's fetch hook exactly as an intercepted
//! browser request would be: classified, then served by the partition's
//! strategy.

use netstash_core::{Engine, Error, InboundRequest};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchParams {
    /// URL to request. Relative URLs resolve against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are ever cached.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for proxy_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProxyFetchOutput {
    /// Canonical URL the request was made for.
    pub url: String,
    /// Whether the engine handled the request. `false` means pass-through.
    pub intercepted: bool,
    /// Partition that served the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8, with invalid sequences replaced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub body_bytes: usize,
}

/// Implementation of the proxy_fetch tool.
pub async fn proxy_impl(engine: &Engine, params: ProxyFetchParams) -> Result<CallToolResult, McpError> {
    let url = engine.settings().resolve(&params.url).map_err(Error::from)?;
    let request = InboundRequest::new(params.method, url);

    let partition = engine
        .settings()
        .classifier
        .classify(&request)
        .map(|kind| engine.settings().partitions.get(kind).name.clone());

    let output = match engine.handle_fetch(&request).await {
        Some(response) => ProxyFetchOutput {
            url: request.url.to_string(),
            intercepted: true,
            partition,
            status: Some(response.status),
            status_text: Some(response.status_text.clone()),
            body_bytes: response.body.len(),
            body: Some(String::from_utf8_lossy(&response.body).into_owned()),
            headers: response.headers,
        },
        None => ProxyFetchOutput {
            url: request.url.to_string(),
            intercepted: false,
            partition: None,
            status: None,
            status_text: None,
            headers: Vec::new(),
            body: None,
            body_bytes: 0,
        },
    };

    tracing::info!(url = %output.url, intercepted = output.intercepted, status = ?output.status, "proxy_fetch");
    json_result(&output)
}
