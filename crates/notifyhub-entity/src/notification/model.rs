//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::kind::NotificationKind;
use super::payload::NotificationData;
use super::priority::NotificationPriority;
use super::status::NotificationStatus;

/// A notification to be delivered to a user.
///
/// One row per delivery intent. The row itself is the in-app channel and
/// the durable source of truth; push and email delivery bookkeeping is
/// written back by the processors.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// The recipient user. Immutable.
    pub user_id: Uuid,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Display title.
    pub title: String,
    /// Display body text.
    pub message: String,
    /// Optional deep-link target.
    pub action_url: Option<String>,
    /// Optional deep-link label.
    pub action_text: Option<String>,
    /// Structured, kind-specific payload.
    pub data: Option<Json<NotificationData>>,
    /// Priority level.
    pub priority: NotificationPriority,
    /// Lifecycle status. Monotonic; never reverts from `Archived`.
    pub status: NotificationStatus,
    /// Earliest time this notification is eligible for dispatch.
    pub scheduled_for: DateTime<Utc>,
    /// Once passed, dispatch must be skipped.
    pub expires_at: Option<DateTime<Utc>>,
    /// Correlates notifications created together with their dispatch jobs.
    pub group_key: String,
    /// Set when created via the batch API.
    pub batch_id: Option<Uuid>,
    /// Whether a push fan-out ran for this notification.
    pub push_sent: bool,
    /// Whether at least one push endpoint accepted the message.
    pub delivered: bool,
    /// When delivery bookkeeping was written.
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the notification was created.
    pub created_at: DateTime<Utc>,
    /// When the notification was read.
    pub read_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Check if the notification has been read.
    pub fn is_unread(&self) -> bool {
        self.status == NotificationStatus::Unread
    }

    /// Check if the notification has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}

/// The producer-supplied part of a notification, before validation and
/// persistence. Batch jobs carry a list of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationDraft {
    /// The recipient user.
    pub user_id: Uuid,
    /// Notification kind.
    pub kind: NotificationKind,
    /// Display title.
    pub title: String,
    /// Display body text.
    pub message: String,
    /// Optional deep-link target.
    #[serde(default)]
    pub action_url: Option<String>,
    /// Optional deep-link label.
    #[serde(default)]
    pub action_text: Option<String>,
    /// Structured payload.
    #[serde(default)]
    pub data: Option<NotificationData>,
    /// Priority level.
    #[serde(default)]
    pub priority: NotificationPriority,
    /// Optional expiry.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl NotificationDraft {
    /// Create a minimal draft with default priority and no payload.
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            action_url: None,
            action_text: None,
            data: None,
            priority: NotificationPriority::default(),
            expires_at: None,
        }
    }
}
