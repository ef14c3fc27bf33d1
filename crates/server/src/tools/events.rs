//! push_notify and background_sync tool implementations.
//!
//! Deliver platform events to the worker. Neither touches the cache.

use mbm_sw_client::{Notifier, handle_push, handle_sync};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Parameters for the push_notify tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushNotifyParams {
    /// Push message data: a JSON object with title, body, icon and url, or
    /// plain text used as the body.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Parameters for the background_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundSyncParams {
    /// Sync tag registered by the app (e.g. "sync-posts").
    pub tag: String,
}

/// Output from the background_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackgroundSyncOutput {
    pub tag: String,
    /// Whether the tag is one the worker handles.
    pub handled: bool,
}

/// Implementation of the push_notify tool.
pub async fn push_impl(notifier: &dyn Notifier, params: PushNotifyParams) -> Result<CallToolResult, McpError> {
    let notification = handle_push(notifier, params.payload.as_deref().map(str::as_bytes)).await;
    json_result(&notification)
}

/// Implementation of the background_sync tool.
pub async fn sync_impl(params: BackgroundSyncParams) -> Result<CallToolResult, McpError> {
    if params.tag.trim().is_empty() {
        return Err(ToolError::InvalidInput("tag cannot be empty".into()).into());
    }
    let handled = handle_sync(&params.tag);
    json_result(&BackgroundSyncOutput { tag: params.tag, handled })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output;
    use mbm_sw_client::LogNotifier;

    #[tokio::test]
    async fn test_push_with_json_payload() {
        let params = PushNotifyParams { payload: Some(r#"{"title":"New like","url":"/posts/9"}"#.to_string()) };
        let result = push_impl(&LogNotifier, params).await.unwrap();
        let out: serde_json::Value = output(&result);
        assert_eq!(out["title"], "New like");
        assert_eq!(out["url"], "/posts/9");
        assert_eq!(out["icon"], "/icons/icon-192x192.png");
    }

    #[tokio::test]
    async fn test_push_without_payload() {
        let result = push_impl(&LogNotifier, PushNotifyParams::default()).await.unwrap();
        let out: serde_json::Value = output(&result);
        assert_eq!(out["title"], "MBM Connect");
        assert!(out["body"].is_null());
    }

    #[tokio::test]
    async fn test_sync_known_and_unknown_tags() {
        let out: BackgroundSyncOutput =
            output(&sync_impl(BackgroundSyncParams { tag: "sync-posts".into() }).await.unwrap());
        assert!(out.handled);

        let out: BackgroundSyncOutput =
            output(&sync_impl(BackgroundSyncParams { tag: "sync-likes".into() }).await.unwrap());
        assert!(!out.handled);
    }

    #[tokio::test]
    async fn test_sync_empty_tag() {
        let err = sync_impl(BackgroundSyncParams { tag: String::new() }).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }
}
