//! Notification list filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notifyhub_core::types::page::DEFAULT_PAGE_LIMIT;

use super::kind::NotificationKind;
use super::priority::NotificationPriority;
use super::status::NotificationStatus;

/// Filters for listing notifications. Results are newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// The owning user. Always required; listing is never cross-user.
    pub user_id: Uuid,
    /// Filter by kind.
    pub kind: Option<NotificationKind>,
    /// Filter by status.
    pub status: Option<NotificationStatus>,
    /// Filter by priority.
    pub priority: Option<NotificationPriority>,
    /// Filter by group key.
    pub group_key: Option<String>,
    /// Only notifications created at or after this time.
    pub created_after: Option<DateTime<Utc>>,
    /// Only notifications created before this time.
    pub created_before: Option<DateTime<Utc>>,
    /// Maximum items to return.
    pub limit: i64,
    /// Items to skip.
    pub offset: i64,
}

impl NotificationQuery {
    /// A query over one user's notifications with the default window.
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            kind: None,
            status: None,
            priority: None,
            group_key: None,
            created_after: None,
            created_before: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }

    /// Restrict to one status.
    pub fn with_status(mut self, status: NotificationStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to one kind.
    pub fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to a creation-time range.
    pub fn created_between(
        mut self,
        after: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Self {
        self.created_after = Some(after);
        self.created_before = Some(before);
        self
    }

    /// Set the window.
    pub fn window(mut self, limit: i64, offset: i64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}
