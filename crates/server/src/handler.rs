//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    SwFetchParams, SwInstallParams,
    cache::{self, CacheGetParams},
    fetch::fetch_impl,
    lifecycle::{install_impl, release_impl, status_impl},
};

use pwa_core::{CacheStore, Registration, WorkerConfig};
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

/// The main MCP server handler for pwa-sw.
#[derive(Clone)]
pub struct PwaServer {
    registration: Arc<Registration>,
    store: Arc<dyn CacheStore>,
    base: Arc<WorkerConfig>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PwaServer {
    /// Create a new server handler.
    pub fn new(registration: Arc<Registration>, store: Arc<dyn CacheStore>, base: WorkerConfig) -> Self {
        Self { registration, store, base: Arc::new(base), tool_router: Self::tool_router() }
    }

    /// Install a worker version.
    ///
    /// Pre-caches the manifest into the version's namespace, activates it and
    /// deletes every other namespace.
    #[tool(
        description = "Install a service worker version: pre-cache the resource manifest, activate, and delete stale caches. Pass cache_name to simulate a version bump."
    )]
    async fn sw_install(&self, params: Parameters<SwInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.registration, &self.base, params.0).await
    }

    #[tool(
        description = "Fetch a URL through the active service worker. Reports whether the answer came from cache, network, the offline page or a synthetic timeout."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, self.base.origin(), params.0).await
    }

    #[tool(
        description = "Activate the waiting service worker as if every page controlled by the current one had closed."
    )]
    async fn sw_release_clients(&self) -> Result<CallToolResult, McpError> {
        release_impl(&self.registration).await
    }

    #[tool(description = "Show the active and waiting service workers and whether clients are controlled.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    #[tool(description = "List cache namespaces and the request identities stored in each.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        cache::keys_impl(self.store.as_ref()).await
    }

    #[tool(description = "Read a cached response by namespace and URL.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        cache::get_impl(self.store.as_ref(), self.base.origin(), params.0).await
    }
}

impl ServerHandler for PwaServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "pwa-sw".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Offline-first cache policy for a web app. Install a version with sw_install, then sw_fetch URLs \
                 to see cache-first behavior and offline fallbacks."
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
