//! Notification preference entity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::kind::NotificationKind;

/// Digest cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "digest_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DigestFrequency {
    /// One digest per day.
    Daily,
    /// One digest per week.
    Weekly,
}

impl DigestFrequency {
    /// The look-back window covered by one digest.
    pub fn window(&self) -> chrono::Duration {
        match self {
            Self::Daily => chrono::Duration::days(1),
            Self::Weekly => chrono::Duration::days(7),
        }
    }
}

/// Per-user notification delivery preferences.
///
/// Created lazily with defaults on first read or write.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationPreference {
    /// The user these preferences belong to.
    pub user_id: Uuid,
    /// Whether the email channel is enabled.
    pub email_enabled: bool,
    /// Whether the push channel is enabled.
    pub push_enabled: bool,
    /// Whether the in-app channel is enabled.
    pub in_app_enabled: bool,
    /// Per-kind opt-outs. A kind absent from the map is enabled.
    pub kind_preferences: Json<HashMap<NotificationKind, bool>>,
    /// Quiet-hours window start, `"HH:MM"` local to `timezone`.
    pub quiet_hours_start: Option<String>,
    /// Quiet-hours window end, `"HH:MM"` local to `timezone`.
    pub quiet_hours_end: Option<String>,
    /// IANA timezone name (e.g. `"Europe/Berlin"`).
    pub timezone: String,
    /// Whether digest emails are enabled.
    pub digest_enabled: bool,
    /// Digest cadence.
    pub digest_frequency: DigestFrequency,
    /// Local time of day the digest is built, `"HH:MM"`.
    pub digest_time: String,
    /// Identity of the live digest-build chain. Rotated whenever the
    /// digest settings change; pending builds stamped with an older id
    /// complete as no-ops, so at most one chain runs per user.
    pub digest_chain_id: Uuid,
    /// Whether producers may coalesce this user's notifications.
    pub batching_enabled: bool,
    /// Coalescing delay in seconds.
    pub batching_delay_seconds: i32,
    /// When preferences were last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

impl NotificationPreference {
    /// Default preferences for a user: all channels on, UTC, daily digest
    /// disabled, batching on with a 300 second delay.
    pub fn default_for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_enabled: true,
            push_enabled: true,
            in_app_enabled: true,
            kind_preferences: Json(HashMap::new()),
            quiet_hours_start: None,
            quiet_hours_end: None,
            timezone: "UTC".to_string(),
            digest_enabled: false,
            digest_frequency: DigestFrequency::Daily,
            digest_time: "08:00".to_string(),
            digest_chain_id: Uuid::new_v4(),
            batching_enabled: true,
            batching_delay_seconds: 300,
            updated_at: Some(Utc::now()),
        }
    }

    /// Whether the given kind is enabled for this user.
    pub fn kind_enabled(&self, kind: NotificationKind) -> bool {
        self.kind_preferences
            .0
            .get(&kind)
            .copied()
            .unwrap_or(true)
    }

    /// The quiet-hours window, if fully configured.
    pub fn quiet_window(&self) -> Option<(&str, &str)> {
        match (&self.quiet_hours_start, &self.quiet_hours_end) {
            (Some(start), Some(end)) => Some((start.as_str(), end.as_str())),
            _ => None,
        }
    }
}
