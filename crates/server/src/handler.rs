//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::asset_fetch::{AssetFetchParams, fetch_impl};
use crate::tools::cache::{CacheListParams, CachePurgeParams, list_impl, purge_impl};
use crate::tools::events::{BackgroundSyncParams, PushNotifyParams, push_impl, sync_impl};

use mbm_sw_client::{AssetCacheManager, LogNotifier, Notifier};
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

/// The main MCP server handler for mbm-sw.
#[derive(Clone)]
pub struct McpSwServer {
    manager: Arc<AssetCacheManager>,
    notifier: Arc<dyn Notifier>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl McpSwServer {
    /// Create a new server handler around a booted manager.
    pub fn new(manager: Arc<AssetCacheManager>) -> Self {
        Self { manager, notifier: Arc::new(LogNotifier), tool_router: Self::tool_router() }
    }

    /// Fetch an asset through the worker.
    #[tool(
        description = "Fetch a path or URL through the offline asset cache. Returns status, body and whether it was served from cache, network, cache_fallback or pass_through."
    )]
    async fn asset_fetch(&self, params: Parameters<AssetFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.manager, params.0).await
    }

    /// List cache partitions or the entries of one partition.
    #[tool(description = "List cache partitions with entry counts, or the stored entries of one partition.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.manager, params.0).await
    }

    /// Delete a partition or old entries.
    #[tool(
        description = "Delete a whole cache partition, or entries older than older_than_secs (dynamic partition by default)."
    )]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.manager, params.0).await
    }

    /// Deliver a push message.
    #[tool(description = "Deliver a push message to the worker and return the notification it shows.")]
    async fn push_notify(&self, params: Parameters<PushNotifyParams>) -> Result<CallToolResult, McpError> {
        push_impl(self.notifier.as_ref(), params.0).await
    }

    /// Deliver a background-sync event.
    #[tool(description = "Deliver a background-sync event with the given tag (e.g. sync-posts).")]
    async fn background_sync(&self, params: Parameters<BackgroundSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(params.0).await
    }
}

impl ServerHandler for McpSwServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "mbm-sw".into(),
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
