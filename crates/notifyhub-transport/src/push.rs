//! Web push delivery over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use notifyhub_core::config::PushConfig;
use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_entity::notification::{NotificationPriority, PushSubscription};

const MAX_TITLE_CHARS: usize = 120;
const MAX_BODY_CHARS: usize = 600;

/// The JSON document posted to a push endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    /// Short headline shown by the client.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Where the client should navigate on click.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Notification kind, as its wire name.
    pub kind: String,
    /// Delivery priority, mapped to the `Urgency` header.
    #[serde(skip)]
    pub priority: NotificationPriority,
}

impl PushMessage {
    fn urgency(&self) -> &'static str {
        match self.priority {
            NotificationPriority::Low => "very-low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High | NotificationPriority::Urgent => "high",
        }
    }
}

/// A single delivery attempt's failure.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The endpoint no longer exists (404/410); the subscription is dead.
    #[error("push endpoint is gone")]
    Gone,
    /// The push service rejected the request.
    #[error("push service returned {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },
    /// The request never got a response.
    #[error("push request failed: {0}")]
    Transport(String),
}

/// Delivery of one message to one subscription.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Post `message` to the subscription's endpoint.
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError>;
}

/// [`PushTransport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct WebPushClient {
    client: reqwest::Client,
    ttl_seconds: u32,
}

impl WebPushClient {
    /// Build the HTTP client from push configuration.
    pub fn new(config: &PushConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build push client", e)
            })?;
        Ok(Self {
            client,
            ttl_seconds: config.ttl_seconds,
        })
    }
}

#[async_trait]
impl PushTransport for WebPushClient {
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError> {
        // TODO: encrypt the body per RFC 8291 (aes128gcm) and sign VAPID
        // headers once key provisioning lands; until then endpoints that
        // require encryption reject with a 4xx, surfaced as Rejected.
        let mut capped = message.clone();
        capped.title = truncate_chars(&capped.title, MAX_TITLE_CHARS);
        capped.body = truncate_chars(&capped.body, MAX_BODY_CHARS);

        let body = serde_json::to_vec(&capped)
            .map_err(|e| PushError::Transport(format!("payload serialization failed: {e}")))?;

        let response = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_seconds.to_string())
            .header("Content-Type", "application/octet-stream")
            .header("Urgency", message.urgency())
            .body(body)
            .send()
            .await
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.as_u16() == 404 || status.as_u16() == 410 {
            return Err(PushError::Gone);
        }
        Err(PushError::Rejected {
            status: status.as_u16(),
        })
    }
}

fn truncate_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
