//! Push fan-out job handler.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use notifyhub_core::clock::Clock;
use notifyhub_database::stores::{NotificationStore, PreferenceStore, SubscriptionStore};
use notifyhub_entity::job::model::Job;
use notifyhub_entity::job::payload::PushFanoutPayload;
use notifyhub_entity::notification::{Notification, NotificationPreference, NotificationPriority};
use notifyhub_transport::push::{PushError, PushMessage, PushTransport};

use crate::executor::{JobExecutionError, JobHandler};

/// Delivers one notification group to every active subscription of one
/// user. Endpoint failures are isolated per-subscription; the job only
/// fails (transiently) when no endpoint accepted the message.
pub struct PushFanoutHandler {
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    transport: Arc<dyn PushTransport>,
    clock: Arc<dyn Clock>,
    concurrency: usize,
}

impl PushFanoutHandler {
    /// Create a new push fan-out handler.
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        transport: Arc<dyn PushTransport>,
        clock: Arc<dyn Clock>,
        concurrency: usize,
    ) -> Self {
        Self {
            preferences,
            notifications,
            subscriptions,
            transport,
            clock,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl JobHandler for PushFanoutHandler {
    fn job_type(&self) -> &str {
        notifyhub_queue::names::PUSH_FANOUT
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let payload: PushFanoutPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid fan-out payload: {e}")))?;

        let prefs = self
            .preferences
            .find_preferences(payload.user_id)
            .await?
            .unwrap_or_else(|| NotificationPreference::default_for_user(payload.user_id));
        if !prefs.push_enabled {
            return Ok(Some(serde_json::json!({ "skipped": "push_disabled" })));
        }

        let now = self.clock.now();
        let group = self.notifications.find_by_group(&payload.group_key).await?;
        let pending: Vec<&Notification> = group
            .iter()
            .filter(|n| n.user_id == payload.user_id && !n.is_expired(now))
            .collect();
        if pending.is_empty() {
            let reason = if group.iter().any(|n| n.user_id == payload.user_id) {
                "expired"
            } else {
                "no_notifications"
            };
            return Ok(Some(serde_json::json!({ "skipped": reason })));
        }

        let subscriptions = self.subscriptions.find_active(payload.user_id).await?;
        if subscriptions.is_empty() {
            return Ok(Some(serde_json::json!({ "skipped": "no_subscriptions" })));
        }

        let Some(message) = render_message(&pending) else {
            return Ok(Some(serde_json::json!({ "skipped": "no_notifications" })));
        };
        let attempted = subscriptions.len();
        let results: Vec<_> = stream::iter(subscriptions)
            .map(|sub| {
                let message = &message;
                let transport = Arc::clone(&self.transport);
                async move {
                    let outcome = transport.send(&sub, message).await;
                    (sub, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut delivered = 0usize;
        let mut deactivated = 0usize;
        let mut failed = 0usize;
        for (sub, outcome) in results {
            match outcome {
                Ok(()) => {
                    delivered += 1;
                    if let Err(e) = self.subscriptions.touch(sub.id, now).await {
                        tracing::warn!(subscription_id = %sub.id, error = %e, "Failed to record push attempt");
                    }
                }
                Err(PushError::Gone) => {
                    deactivated += 1;
                    tracing::info!(endpoint = %sub.endpoint, "Deactivating gone push endpoint");
                    if let Err(e) = self
                        .subscriptions
                        .deactivate(sub.user_id, &sub.endpoint)
                        .await
                    {
                        tracing::warn!(endpoint = %sub.endpoint, error = %e, "Failed to deactivate subscription");
                    }
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(endpoint = %sub.endpoint, error = %e, "Push delivery failed");
                }
            }
        }

        if delivered == 0 {
            return Err(JobExecutionError::Transient(format!(
                "All {attempted} push deliveries failed"
            )));
        }

        self.notifications
            .record_delivery(&payload.group_key, payload.user_id, true, now)
            .await?;

        Ok(Some(serde_json::json!({
            "attempted": attempted,
            "delivered": delivered,
            "deactivated": deactivated,
            "failed": failed,
        })))
    }
}

/// One push message summarizing the pending group. `None` only when the
/// group is empty.
fn render_message(pending: &[&Notification]) -> Option<PushMessage> {
    let newest = pending.iter().max_by_key(|n| n.created_at)?;
    let priority = pending
        .iter()
        .map(|n| n.priority)
        .max()
        .unwrap_or(NotificationPriority::Normal);

    let (title, body) = if pending.len() == 1 {
        (newest.title.clone(), newest.message.clone())
    } else {
        (
            format!("{} new notifications", pending.len()),
            newest.title.clone(),
        )
    };
    Some(PushMessage {
        title,
        body,
        url: newest.action_url.clone(),
        kind: newest.kind.as_str().to_string(),
        priority,
    })
}
