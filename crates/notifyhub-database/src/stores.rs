//! Store traits consumed by the service and the workers.
//!
//! The pipeline programs against these traits rather than concrete
//! repositories so the scheduling, suppression, and delivery logic can be
//! tested against in-memory implementations. The Postgres implementations
//! live in [`crate::repositories`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use notifyhub_core::result::AppResult;
use notifyhub_entity::job::model::{Job, NewJob};
use notifyhub_entity::notification::{
    Notification, NotificationKind, NotificationPreference, NotificationQuery,
    NotificationStatus, PushSubscription,
};
use notifyhub_entity::user::User;

/// One cell of the per-user (kind, status) count aggregation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StatusCount {
    /// Notification kind.
    pub kind: NotificationKind,
    /// Notification status.
    pub status: NotificationStatus,
    /// Number of rows in this cell.
    pub count: i64,
}

/// Job counts by effective state for one queue.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobCounts {
    /// Waiting and eligible to run.
    pub waiting: i64,
    /// Currently being processed.
    pub active: i64,
    /// Completed successfully.
    pub completed: i64,
    /// Permanently failed.
    pub failed: i64,
    /// Waiting with a future `scheduled_at`.
    pub delayed: i64,
}

/// Read access to platform users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by ID.
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
}

/// Per-user delivery preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Find stored preferences, if the user ever touched them.
    async fn find_preferences(&self, user_id: Uuid)
        -> AppResult<Option<NotificationPreference>>;

    /// Insert or replace preferences, returning the stored row.
    async fn upsert_preferences(
        &self,
        prefs: &NotificationPreference,
    ) -> AppResult<NotificationPreference>;
}

/// Durable notification records and their lifecycle updates.
///
/// All mutations are conditional updates scoped by ownership and current
/// status; the row count tells the caller whether anything matched.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification and return the stored row.
    async fn create(&self, notification: &Notification) -> AppResult<Notification>;

    /// List notifications matching the query, newest first.
    async fn find(&self, query: &NotificationQuery) -> AppResult<Vec<Notification>>;

    /// Count notifications matching the query (ignoring its window).
    async fn count(&self, query: &NotificationQuery) -> AppResult<i64>;

    /// All notifications sharing a group key.
    async fn find_by_group(&self, group_key: &str) -> AppResult<Vec<Notification>>;

    /// UNREAD → READ for one owned row. Returns rows transitioned (0 or 1).
    async fn mark_read(&self, id: Uuid, user_id: Uuid, read_at: DateTime<Utc>)
        -> AppResult<u64>;

    /// UNREAD → READ for many owned rows. Returns rows transitioned.
    async fn mark_many_read(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Status → ARCHIVED for one owned, non-terminal row.
    async fn archive(&self, id: Uuid, user_id: Uuid) -> AppResult<u64>;

    /// Write push delivery bookkeeping on one user's rows sharing
    /// `group_key`. Other recipients in the group are untouched; their own
    /// fan-out jobs record their outcomes.
    async fn record_delivery(
        &self,
        group_key: &str,
        user_id: Uuid,
        delivered: bool,
        delivered_at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Per-(kind, status) counts for one user, from a single grouped query.
    async fn status_counts(&self, user_id: Uuid) -> AppResult<Vec<StatusCount>>;

    /// Unread notifications for a user created inside `[from, to]`.
    async fn find_unread_in_window(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>>;

    /// Delete ARCHIVED rows created before `cutoff`. Returns rows deleted.
    async fn delete_archived_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

/// Registered web-push endpoints.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Active subscriptions for one user.
    async fn find_active(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>>;

    /// Insert or refresh a subscription keyed by (user, endpoint),
    /// reactivating it if previously unsubscribed.
    async fn upsert(&self, subscription: &PushSubscription) -> AppResult<PushSubscription>;

    /// Flag a subscription inactive. Returns rows affected.
    async fn deactivate(&self, user_id: Uuid, endpoint: &str) -> AppResult<u64>;

    /// Record a delivery attempt time on a subscription.
    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> AppResult<()>;
}

/// The persistent job queue's storage.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a new waiting job.
    async fn create(&self, job: &NewJob) -> AppResult<Job>;

    /// Atomically claim the oldest eligible waiting job of one type,
    /// marking it active and incrementing its attempt counter.
    async fn claim_next(
        &self,
        queue: &str,
        job_type: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>>;

    /// Mark a job completed with an optional result.
    async fn complete(
        &self,
        id: Uuid,
        result: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark a job permanently failed.
    async fn fail(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> AppResult<()>;

    /// Return a job to waiting with a new eligibility time (backoff retry).
    async fn reschedule(&self, id: Uuid, run_at: DateTime<Utc>, error: &str) -> AppResult<()>;

    /// Job counts for one queue, classifying future-scheduled waiting jobs
    /// as delayed.
    async fn counts(&self, queue: &str, now: DateTime<Utc>) -> AppResult<JobCounts>;
}
