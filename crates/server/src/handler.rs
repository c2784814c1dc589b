//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the engine.
use crate::tools::control::{cache_info_impl, cache_urls_impl, clear_cache_impl, post_message_impl, skip_waiting_impl};
use crate::tools::proxy::proxy_impl;
use crate::tools::{CacheUrlsParams, ClearCacheParams, PostMessageParams, ProxyFetchParams};

use netstash_core::Engine;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for netstash.
#[derive(Clone)]
pub struct NetstashServer {
    tool_router: ToolRouter<Self>,
    engine: Engine,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl NetstashServer {
    /// Create a new server handler over a running engine.
    pub fn new(engine: Engine) -> Self {
        Self { tool_router: Self::tool_router(), engine }
    }

    #[tool(
        description = "Request a URL through the cache. The request is classified into a partition and served by that partition's strategy (cache-first, network-first, or stale-while-revalidate)."
    )]
    async fn proxy_fetch(&self, params: Parameters<ProxyFetchParams>) -> Result<CallToolResult, McpError> {
        proxy_impl(&self.engine, params.0).await
    }

    #[tool(description = "Activate the installed cache version immediately.")]
    async fn skip_waiting(&self) -> Result<CallToolResult, McpError> {
        skip_waiting_impl(&self.engine).await
    }

    #[tool(description = "Fetch a list of URLs into the API partition. Returns which were cached and which failed.")]
    async fn cache_urls(&self, params: Parameters<CacheUrlsParams>) -> Result<CallToolResult, McpError> {
        cache_urls_impl(&self.engine, params.0).await
    }

    #[tool(description = "Delete cache partitions by name, or every partition of the current version when none are given.")]
    async fn clear_cache(&self, params: Parameters<ClearCacheParams>) -> Result<CallToolResult, McpError> {
        clear_cache_impl(&self.engine, params.0).await
    }

    #[tool(description = "Report the cache version and, for each partition, its size and cached URLs.")]
    async fn cache_info(&self) -> Result<CallToolResult, McpError> {
        cache_info_impl(&self.engine).await
    }

    #[tool(
        description = "Send a raw control message: SKIP_WAITING, CACHE_URLS {urls}, CLEAR_CACHE {cacheNames}, or GET_CACHE_INFO."
    )]
    async fn post_message(&self, params: Parameters<PostMessageParams>) -> Result<CallToolResult, McpError> {
        post_message_impl(&self.engine, params.0).await
    }
}

impl ServerHandler for NetstashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "netstash".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
