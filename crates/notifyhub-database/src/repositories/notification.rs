//! Notification repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_entity::notification::{Notification, NotificationQuery};

use crate::stores::{NotificationStore, StatusCount};

/// Repository for notification rows and their conditional lifecycle updates.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a NotificationQuery) {
        builder.push(" WHERE user_id = ").push_bind(query.user_id);
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ").push_bind(kind);
        }
        if let Some(status) = query.status {
            builder.push(" AND status = ").push_bind(status);
        }
        if let Some(priority) = query.priority {
            builder.push(" AND priority = ").push_bind(priority);
        }
        if let Some(group_key) = &query.group_key {
            builder.push(" AND group_key = ").push_bind(group_key);
        }
        if let Some(after) = query.created_after {
            builder.push(" AND created_at >= ").push_bind(after);
        }
        if let Some(before) = query.created_before {
            builder.push(" AND created_at < ").push_bind(before);
        }
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn create(&self, n: &Notification) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications \
             (id, user_id, kind, title, message, action_url, action_text, data, priority, \
              status, scheduled_for, expires_at, group_key, batch_id, push_sent, delivered, \
              delivered_at, created_at, read_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $18, $19) \
             RETURNING *",
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.kind)
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.action_url)
        .bind(&n.action_text)
        .bind(&n.data)
        .bind(n.priority)
        .bind(n.status)
        .bind(n.scheduled_for)
        .bind(n.expires_at)
        .bind(&n.group_key)
        .bind(n.batch_id)
        .bind(n.push_sent)
        .bind(n.delivered)
        .bind(n.delivered_at)
        .bind(n.created_at)
        .bind(n.read_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create notification", e)
        })
    }

    async fn find(&self, query: &NotificationQuery) -> AppResult<Vec<Notification>> {
        let mut builder = QueryBuilder::new("SELECT * FROM notifications");
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        builder
            .build_query_as::<Notification>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to list notifications", e)
            })
    }

    async fn count(&self, query: &NotificationQuery) -> AppResult<i64> {
        let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM notifications");
        Self::push_filters(&mut builder, query);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count notifications", e)
            })
    }

    async fn find_by_group(&self, group_key: &str) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE group_key = $1 ORDER BY created_at",
        )
        .bind(group_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find group", e))
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = $3 \
             WHERE id = $1 AND user_id = $2 AND status = 'unread'",
        )
        .bind(id)
        .bind(user_id)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark read", e))?;
        Ok(result.rows_affected())
    }

    async fn mark_many_read(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'read', read_at = $3 \
             WHERE id = ANY($1) AND user_id = $2 AND status = 'unread'",
        )
        .bind(ids)
        .bind(user_id)
        .bind(read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to mark many read", e))?;
        Ok(result.rows_affected())
    }

    async fn archive(&self, id: Uuid, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET status = 'archived' \
             WHERE id = $1 AND user_id = $2 AND status IN ('unread', 'read')",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to archive notification", e)
        })?;
        Ok(result.rows_affected())
    }

    async fn record_delivery(
        &self,
        group_key: &str,
        user_id: Uuid,
        delivered: bool,
        delivered_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET push_sent = TRUE, delivered = $3, delivered_at = $4 \
             WHERE group_key = $1 AND user_id = $2",
        )
        .bind(group_key)
        .bind(user_id)
        .bind(delivered)
        .bind(delivered_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to record delivery", e)
        })?;
        Ok(result.rows_affected())
    }

    async fn status_counts(&self, user_id: Uuid) -> AppResult<Vec<StatusCount>> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT kind, status, COUNT(*) AS count FROM notifications \
             WHERE user_id = $1 GROUP BY kind, status",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to aggregate stats", e))
    }

    async fn find_unread_in_window(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications \
             WHERE user_id = $1 AND status = 'unread' \
             AND created_at >= $2 AND created_at <= $3 \
             ORDER BY created_at DESC LIMIT $4",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to load digest window", e)
        })
    }

    async fn delete_archived_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE status = 'archived' AND created_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to sweep notifications", e)
        })?;
        Ok(result.rows_affected())
    }
}
