use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_database::stores::{
    JobCounts, JobStore, NotificationStore, PreferenceStore, StatusCount, SubscriptionStore,
    UserStore,
};
use notifyhub_entity::job::model::{Job, NewJob};
use notifyhub_entity::job::JobStatus;
use notifyhub_entity::notification::{
    Notification, NotificationPreference, NotificationQuery, NotificationStatus, PushSubscription,
};
use notifyhub_entity::user::User;

/// In-memory [`UserStore`].
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user and return its ID.
    pub fn add(&self, email: &str, display_name: &str) -> Uuid {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        let id = user.id;
        self.users.lock().unwrap().insert(id, user);
        id
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }
}

/// In-memory [`PreferenceStore`].
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    prefs: Mutex<HashMap<Uuid, NotificationPreference>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored preferences directly.
    pub fn seed(&self, prefs: NotificationPreference) {
        self.prefs.lock().unwrap().insert(prefs.user_id, prefs);
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn find_preferences(
        &self,
        user_id: Uuid,
    ) -> AppResult<Option<NotificationPreference>> {
        Ok(self.prefs.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert_preferences(
        &self,
        prefs: &NotificationPreference,
    ) -> AppResult<NotificationPreference> {
        self.prefs
            .lock()
            .unwrap()
            .insert(prefs.user_id, prefs.clone());
        Ok(prefs.clone())
    }
}

/// In-memory [`NotificationStore`].
#[derive(Debug, Default)]
pub struct MemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row, in insertion order.
    pub fn all(&self) -> Vec<Notification> {
        self.rows.lock().unwrap().clone()
    }

    fn matches(n: &Notification, query: &NotificationQuery) -> bool {
        n.user_id == query.user_id
            && query.kind.map_or(true, |k| n.kind == k)
            && query.status.map_or(true, |s| n.status == s)
            && query.priority.map_or(true, |p| n.priority == p)
            && query
                .group_key
                .as_ref()
                .map_or(true, |g| &n.group_key == g)
            && query.created_after.map_or(true, |t| n.created_at >= t)
            && query.created_before.map_or(true, |t| n.created_at < t)
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, notification: &Notification) -> AppResult<Notification> {
        self.rows.lock().unwrap().push(notification.clone());
        Ok(notification.clone())
    }

    async fn find(&self, query: &NotificationQuery) -> AppResult<Vec<Notification>> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<Notification> = rows
            .iter()
            .filter(|n| Self::matches(n, query))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, query: &NotificationQuery) -> AppResult<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|n| Self::matches(n, query)).count() as i64)
    }

    async fn find_by_group(&self, group_key: &str) -> AppResult<Vec<Notification>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|n| n.group_key == group_key)
            .cloned()
            .collect())
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for n in rows.iter_mut() {
            if n.id == id && n.user_id == user_id && n.status == NotificationStatus::Unread {
                n.status = NotificationStatus::Read;
                n.read_at = Some(read_at);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn mark_many_read(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut affected = 0;
        for id in ids {
            affected += self.mark_read(*id, user_id, read_at).await?;
        }
        Ok(affected)
    }

    async fn archive(&self, id: Uuid, user_id: Uuid) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for n in rows.iter_mut() {
            if n.id == id
                && n.user_id == user_id
                && matches!(
                    n.status,
                    NotificationStatus::Unread | NotificationStatus::Read
                )
            {
                n.status = NotificationStatus::Archived;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn record_delivery(
        &self,
        group_key: &str,
        user_id: Uuid,
        delivered: bool,
        delivered_at: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for n in rows.iter_mut() {
            if n.group_key == group_key && n.user_id == user_id {
                n.push_sent = true;
                n.delivered = delivered;
                n.delivered_at = Some(delivered_at);
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn status_counts(&self, user_id: Uuid) -> AppResult<Vec<StatusCount>> {
        let rows = self.rows.lock().unwrap();
        let mut cells: Vec<StatusCount> = Vec::new();
        for n in rows.iter().filter(|n| n.user_id == user_id) {
            match cells
                .iter_mut()
                .find(|c| c.kind == n.kind && c.status == n.status)
            {
                Some(cell) => cell.count += 1,
                None => cells.push(StatusCount {
                    kind: n.kind,
                    status: n.status,
                    count: 1,
                }),
            }
        }
        Ok(cells)
    }

    async fn find_unread_in_window(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Notification>> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<Notification> = rows
            .iter()
            .filter(|n| {
                n.user_id == user_id
                    && n.status == NotificationStatus::Unread
                    && n.created_at >= from
                    && n.created_at <= to
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn delete_archived_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|n| !(n.status == NotificationStatus::Archived && n.created_at < cutoff));
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory [`SubscriptionStore`].
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    rows: Mutex<Vec<PushSubscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored subscription.
    pub fn all(&self) -> Vec<PushSubscription> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn find_active(&self, user_id: Uuid) -> AppResult<Vec<PushSubscription>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active)
            .cloned()
            .collect())
    }

    async fn upsert(&self, subscription: &PushSubscription) -> AppResult<PushSubscription> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = rows
            .iter_mut()
            .find(|s| s.user_id == subscription.user_id && s.endpoint == subscription.endpoint)
        {
            existing.p256dh_key = subscription.p256dh_key.clone();
            existing.auth_key = subscription.auth_key.clone();
            existing.user_agent = subscription.user_agent.clone();
            existing.is_active = true;
            return Ok(existing.clone());
        }
        let mut stored = subscription.clone();
        stored.is_active = true;
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn deactivate(&self, user_id: Uuid, endpoint: &str) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut affected = 0;
        for s in rows.iter_mut() {
            if s.user_id == user_id && s.endpoint == endpoint && s.is_active {
                s.is_active = false;
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn touch(&self, id: Uuid, used_at: DateTime<Utc>) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(s) = rows.iter_mut().find(|s| s.id == id) {
            s.last_used = Some(used_at);
        }
        Ok(())
    }
}

/// In-memory [`JobStore`]. Insertion order stands in for `created_at`
/// ordering.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    rows: Mutex<Vec<Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored job, in insertion order.
    pub fn all(&self) -> Vec<Job> {
        self.rows.lock().unwrap().clone()
    }

    /// Look up one job.
    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.rows.lock().unwrap().iter().find(|j| j.id == id).cloned()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job: &NewJob) -> AppResult<Job> {
        let now = Utc::now();
        let stored = Job {
            id: Uuid::new_v4(),
            queue: job.queue.clone(),
            job_type: job.job_type.clone(),
            payload: job.payload.clone(),
            result: None,
            error_message: None,
            status: JobStatus::Waiting,
            attempts: 0,
            max_attempts: job.max_attempts,
            backoff_base_secs: job.backoff_base_secs,
            scheduled_at: job.scheduled_at,
            started_at: None,
            completed_at: None,
            worker_id: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn claim_next(
        &self,
        queue: &str,
        job_type: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        let mut rows = self.rows.lock().unwrap();
        let next = rows.iter_mut().find(|j| {
            j.queue == queue
                && j.job_type == job_type
                && j.status == JobStatus::Waiting
                && j.scheduled_at <= now
        });
        Ok(next.map(|j| {
            j.status = JobStatus::Active;
            j.started_at = Some(now);
            j.worker_id = Some(worker_id.to_string());
            j.attempts += 1;
            j.updated_at = now;
            j.clone()
        }))
    }

    async fn complete(
        &self,
        id: Uuid,
        result: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let job = rows
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::new(ErrorKind::NotFound, "No such job"))?;
        job.status = JobStatus::Completed;
        job.result = result;
        job.completed_at = Some(at);
        job.updated_at = at;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let job = rows
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::new(ErrorKind::NotFound, "No such job"))?;
        job.status = JobStatus::Failed;
        job.error_message = Some(error.to_string());
        job.completed_at = Some(at);
        job.updated_at = at;
        Ok(())
    }

    async fn reschedule(&self, id: Uuid, run_at: DateTime<Utc>, error: &str) -> AppResult<()> {
        let mut rows = self.rows.lock().unwrap();
        let job = rows
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::new(ErrorKind::NotFound, "No such job"))?;
        job.status = JobStatus::Waiting;
        job.scheduled_at = run_at;
        job.error_message = Some(error.to_string());
        job.started_at = None;
        job.worker_id = None;
        Ok(())
    }

    async fn counts(&self, queue: &str, now: DateTime<Utc>) -> AppResult<JobCounts> {
        let rows = self.rows.lock().unwrap();
        let mut counts = JobCounts::default();
        for job in rows.iter().filter(|j| j.queue == queue) {
            match job.status {
                JobStatus::Waiting if job.scheduled_at > now => counts.delayed += 1,
                JobStatus::Waiting => counts.waiting += 1,
                JobStatus::Active => counts.active += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}
