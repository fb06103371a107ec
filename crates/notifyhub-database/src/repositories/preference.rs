//! Notification preference repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_entity::notification::NotificationPreference;

use crate::stores::PreferenceStore;

/// Repository for per-user delivery preferences.
#[derive(Debug, Clone)]
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    /// Create a new preference repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PreferenceRepository {
    async fn find_preferences(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<NotificationPreference>> {
        sqlx::query_as::<_, NotificationPreference>(
            "SELECT * FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to get preferences", e))
    }

    async fn upsert_preferences(
        &self,
        prefs: &NotificationPreference,
    ) -> AppResult<NotificationPreference> {
        sqlx::query_as::<_, NotificationPreference>(
            "INSERT INTO notification_preferences \
             (user_id, email_enabled, push_enabled, in_app_enabled, kind_preferences, \
              quiet_hours_start, quiet_hours_end, timezone, digest_enabled, digest_frequency, \
              digest_time, digest_chain_id, batching_enabled, batching_delay_seconds, \
              updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET \
              email_enabled = EXCLUDED.email_enabled, \
              push_enabled = EXCLUDED.push_enabled, \
              in_app_enabled = EXCLUDED.in_app_enabled, \
              kind_preferences = EXCLUDED.kind_preferences, \
              quiet_hours_start = EXCLUDED.quiet_hours_start, \
              quiet_hours_end = EXCLUDED.quiet_hours_end, \
              timezone = EXCLUDED.timezone, \
              digest_enabled = EXCLUDED.digest_enabled, \
              digest_frequency = EXCLUDED.digest_frequency, \
              digest_time = EXCLUDED.digest_time, \
              digest_chain_id = EXCLUDED.digest_chain_id, \
              batching_enabled = EXCLUDED.batching_enabled, \
              batching_delay_seconds = EXCLUDED.batching_delay_seconds, \
              updated_at = NOW() \
             RETURNING *",
        )
        .bind(prefs.user_id)
        .bind(prefs.email_enabled)
        .bind(prefs.push_enabled)
        .bind(prefs.in_app_enabled)
        .bind(&prefs.kind_preferences)
        .bind(&prefs.quiet_hours_start)
        .bind(&prefs.quiet_hours_end)
        .bind(&prefs.timezone)
        .bind(prefs.digest_enabled)
        .bind(prefs.digest_frequency)
        .bind(&prefs.digest_time)
        .bind(prefs.digest_chain_id)
        .bind(prefs.batching_enabled)
        .bind(prefs.batching_delay_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert preferences", e))
    }
}
