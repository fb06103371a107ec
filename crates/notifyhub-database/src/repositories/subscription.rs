//! Push subscription repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_entity::notification::PushSubscription;

use crate::stores::SubscriptionStore;

/// Repository for registered web-push endpoints.
#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Create a new subscription repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn find_active(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        sqlx::query_as::<_, PushSubscription>(
            "SELECT * FROM push_subscriptions \
             WHERE user_id = $1 AND is_active = TRUE ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list subscriptions", e))
    }

    async fn upsert(&self, s: &PushSubscription) -> AppResult<PushSubscription> {
        sqlx::query_as::<_, PushSubscription>(
            "INSERT INTO push_subscriptions \
             (id, user_id, endpoint, p256dh_key, auth_key, user_agent, is_active, last_used, \
              created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8) \
             ON CONFLICT (user_id, endpoint) DO UPDATE SET \
              p256dh_key = EXCLUDED.p256dh_key, \
              auth_key = EXCLUDED.auth_key, \
              user_agent = EXCLUDED.user_agent, \
              is_active = TRUE \
             RETURNING *",
        )
        .bind(s.id)
        .bind(s.user_id)
        .bind(&s.endpoint)
        .bind(&s.p256dh_key)
        .bind(&s.auth_key)
        .bind(&s.user_agent)
        .bind(s.last_used)
        .bind(s.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to upsert subscription", e)
        })
    }

    async fn deactivate(&self, user_id: Uuid, endpoint: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE push_subscriptions SET is_active = FALSE \
             WHERE user_id = $1 AND endpoint = $2",
        )
        .bind(user_id)
        .bind(endpoint)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to deactivate subscription", e)
        })?;
        Ok(result.rows_affected())
    }

    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE push_subscriptions SET last_used = $2 WHERE id = $1")
            .bind(id)
            .bind(used_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to touch subscription", e)
            })?;
        Ok(())
    }
}
