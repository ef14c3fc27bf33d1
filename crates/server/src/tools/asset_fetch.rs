//! asset_fetch tool implementation.
//!
//! Issues a request through the worker, exactly as the page would see it.

use mbm_sw_client::{AssetCacheManager, ServedFrom};
use mbm_sw_core::Request;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for asset_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetFetchParams {
    /// Path relative to the app origin (e.g. "/api/feed") or an absolute URL.
    pub url: String,

    /// HTTP method (default: "GET"). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for asset_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssetFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// HTTP status of the returned response.
    pub status: u16,
    /// Content-Type header, if any.
    pub content_type: Option<String>,
    /// Response body as text (lossy UTF-8).
    pub body: String,
    /// Where the response came from: cache, network, cache_fallback or pass_through.
    pub served_from: String,
    /// A background refresh of the cached copy is still running.
    pub revalidating: bool,
}

fn served_from_label(source: ServedFrom) -> String {
    serde_json::to_value(source)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

/// Implementation of the asset_fetch tool.
pub async fn fetch_impl(manager: &AssetCacheManager, params: AssetFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(ToolError::InvalidInput("method cannot be empty".into()).into());
    }

    let url = manager.router().resolve(&params.url)?;
    let request = Request::new(params.method.trim(), url);

    let outcome = manager.respond(&request).await?;
    tracing::debug!(url = %request.url, source = ?outcome.source, status = outcome.response.status, "asset fetched");

    let output = AssetFetchOutput {
        url: request.url.to_string(),
        status: outcome.response.status,
        content_type: outcome.response.content_type().map(str::to_string),
        body: outcome.response.text(),
        served_from: served_from_label(outcome.source),
        revalidating: outcome.revalidation.is_some(),
    };

    json_result(&output)
}
