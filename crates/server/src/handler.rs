//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    cache::{CacheGetParams, CachePartitionsParams, get_impl, partitions_impl},
    fetch::{FetchParams, fetch_impl},
    refresh::{RefreshParams, refresh_impl},
};

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
use snipcache_client::ControllerHost;
use snipcache_core::AppConfig;
use std::sync::{Arc, PoisonError, RwLock};

/// The main MCP server handler for snipcache.
#[derive(Clone)]
pub struct SnipcacheServer {
    tool_router: ToolRouter<Self>,
    host: Arc<ControllerHost>,
    /// Configuration the active controller was built from.
    config: Arc<RwLock<AppConfig>>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SnipcacheServer {
    /// Create a new server handler around a running controller host.
    pub fn new(host: Arc<ControllerHost>, config: AppConfig) -> Self {
        Self { tool_router: Self::tool_router(), host, config: Arc::new(RwLock::new(config)) }
    }

    fn config(&self) -> AppConfig {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Issue a request through the active controller.
    #[tool(
        description = "Fetch a URL through the cache layer. Relative paths resolve against the configured origin. Returns status, response kind, source (cache/network/offline) and body text."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, &self.config(), params.0).await
    }

    #[tool(description = "Read a stored response from a current-version partition (static, dynamic or snippets).")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.host.registry(), &self.config(), params.0).await
    }

    #[tool(description = "List cache partitions and the request keys stored in each.")]
    async fn cache_partitions(&self, params: Parameters<CachePartitionsParams>) -> Result<CallToolResult, McpError> {
        partitions_impl(self.host.registry(), &self.config(), params.0).await
    }

    /// Reload configuration and activate a new controller if the version changed.
    #[tool(
        description = "Reload configuration and check for a new deployed version. Installs and activates a new controller when the version differs from the active one."
    )]
    async fn refresh(&self, params: Parameters<RefreshParams>) -> Result<CallToolResult, McpError> {
        let loaded = AppConfig::load().map_err(|e| snipcache_core::Error::InvalidInput(e.to_string()))?;
        let (result, adopted) = refresh_impl(&self.host, loaded, params.0).await?;
        if let Some(config) = adopted {
            *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        }
        Ok(result)
    }
}

impl ServerHandler for SnipcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "snipcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline-first cache layer. Use `fetch` to issue requests through the active controller, \
                 `cache_get` and `cache_partitions` to inspect stored responses, and `refresh` after a deploy."
                    .into(),
            ),
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
