//! Push and background-sync handlers.
//!
//! Neither handler touches cache storage.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Background-sync tag registered by the app for queued posts.
pub const SYNC_POSTS_TAG: &str = "sync-posts";

const DEFAULT_TITLE: &str = "MBM Connect";
const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
const DEFAULT_URL: &str = "/";

/// A notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: Option<String>,
    pub icon: String,
    /// Page to open when the notification is clicked.
    pub url: String,
}

#[derive(Debug, Default)]
struct PushPayload {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    url: Option<String>,
}

impl PushPayload {
    /// Fields of a JSON object payload. Fields that are missing or not
    /// strings are left unset.
    fn from_object(object: &serde_json::Map<String, Value>) -> Self {
        let field = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_string);
        Self { title: field("title"), body: field("body"), icon: field("icon"), url: field("url") }
    }

    fn from_text(bytes: &[u8]) -> Self {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        Self { body: (!text.is_empty()).then_some(text), ..Default::default() }
    }
}

impl Notification {
    /// Build a notification from a push payload.
    ///
    /// JSON object payloads fill in any of `title`, `body`, `icon` and `url`;
    /// a field with a non-string value falls back to its default. Any other
    /// payload is shown as the body text.
    pub fn from_push(data: Option<&[u8]>) -> Self {
        let payload = match data {
            None => PushPayload::default(),
            Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(object)) => PushPayload::from_object(&object),
                _ => PushPayload::from_text(bytes),
            },
        };

        Self {
            title: payload.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            body: payload.body,
            icon: payload.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            url: payload.url.unwrap_or_else(|| DEFAULT_URL.to_string()),
        }
    }
}

/// Displays notifications to the user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &Notification);
}

/// Notifier that writes each notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &Notification) {
        tracing::info!(
            title = %notification.title,
            body = notification.body.as_deref().unwrap_or(""),
            url = %notification.url,
            "notification shown"
        );
    }
}

/// Handle a push message: build the notification and show it.
pub async fn handle_push(notifier: &dyn Notifier, data: Option<&[u8]>) -> Notification {
    let notification = Notification::from_push(data);
    notifier.show(&notification).await;
    notification
}

/// Acknowledge a background-sync event. Returns whether the tag is known.
pub fn handle_sync(tag: &str) -> bool {
    let known = tag == SYNC_POSTS_TAG;
    if known {
        tracing::info!(tag, "background sync");
    } else {
        tracing::debug!(tag, "ignoring unknown sync tag");
    }
    known
}
