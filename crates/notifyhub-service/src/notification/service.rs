//! The producer-facing notification service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::types::Json;
use uuid::Uuid;

use notifyhub_core::clock::Clock;
use notifyhub_core::config::QueuesConfig;
use notifyhub_core::error::AppError;
use notifyhub_core::result::AppResult;
use notifyhub_core::types::page::Page;
use notifyhub_database::stores::{
    NotificationStore, PreferenceStore, SubscriptionStore, UserStore,
};
use notifyhub_entity::job::payload::{BatchIngestPayload, DigestBuildPayload, PushFanoutPayload};
use notifyhub_entity::notification::{
    Notification, NotificationDraft, NotificationPreference, NotificationQuery,
    NotificationStatus, PushSubscription,
};
use notifyhub_queue::{names, JobQueue};

use super::quiet_hours;

/// Options for creating a single notification.
#[derive(Debug, Clone)]
pub struct CreateNotification {
    /// The notification content.
    pub draft: NotificationDraft,
    /// Explicit dispatch time. Set by the producer, it overrides quiet-hours
    /// deferral.
    pub scheduled_for: Option<DateTime<Utc>>,
    /// Explicit group key; generated when absent.
    pub group_key: Option<String>,
    /// Dispatch with zero delay regardless of `scheduled_for`.
    pub immediate: bool,
}

impl CreateNotification {
    /// Create options from a draft with defaults.
    pub fn new(draft: NotificationDraft) -> Self {
        Self {
            draft,
            scheduled_for: None,
            group_key: None,
            immediate: false,
        }
    }

    /// Set an explicit dispatch time.
    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    /// Set an explicit group key.
    pub fn group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = Some(key.into());
        self
    }

    /// Dispatch immediately regardless of scheduling.
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }
}

/// Result of a single create: either the persisted row or an explicit
/// suppression signal. Suppression is a defined no-op, not an error.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// The notification was persisted and its dispatch enqueued.
    Created(Notification),
    /// The user has this kind disabled; nothing was persisted or enqueued.
    Suppressed,
}

impl CreateOutcome {
    /// The created notification, if any.
    pub fn created(self) -> Option<Notification> {
        match self {
            Self::Created(n) => Some(n),
            Self::Suppressed => None,
        }
    }
}

/// What happened to a batch submission.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReceipt {
    /// Identifier shared by every notification in the batch.
    pub batch_id: Uuid,
    /// Group key stamped on the batch.
    pub group_key: String,
    /// Drafts accepted into the ingest job.
    pub accepted: usize,
    /// Drafts dropped by validation or preference checks.
    pub dropped: usize,
    /// The enqueued `batch-ingest` job, when any draft survived.
    pub job_id: Option<Uuid>,
}

/// Per-user notification counters.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationStats {
    /// Unread notifications.
    pub unread: i64,
    /// Read notifications.
    pub read: i64,
    /// All notifications regardless of status.
    pub total: i64,
    /// Total per kind (wire name).
    pub by_kind: HashMap<String, i64>,
}

/// A push subscription registration request.
#[derive(Debug, Clone)]
pub struct SubscribePush {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Client public key.
    pub p256dh_key: String,
    /// Client auth secret.
    pub auth_key: String,
    /// Registering user agent.
    pub user_agent: Option<String>,
}

/// The only component producers talk to.
///
/// Owns validation, preference and quiet-hours handling, persistence, and
/// dispatch enqueueing. Never blocks on delivery; enqueue acknowledgment is
/// the only queue interaction it awaits.
#[derive(Clone)]
pub struct NotificationService {
    users: Arc<dyn UserStore>,
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    queue: JobQueue,
    queues: QueuesConfig,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    /// Wire the service to its stores and queue.
    pub fn new(
        users: Arc<dyn UserStore>,
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        queue: JobQueue,
        queues: QueuesConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            preferences,
            notifications,
            subscriptions,
            queue,
            queues,
            clock,
        }
    }

    /// Create one notification, honoring preferences and quiet hours, and
    /// enqueue its push dispatch.
    pub async fn create_notification(
        &self,
        request: CreateNotification,
    ) -> AppResult<CreateOutcome> {
        let draft = &request.draft;
        validate_draft(draft)?;

        if self.users.find_user(draft.user_id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        let prefs = self.load_preferences(draft.user_id).await?;
        if !prefs.kind_enabled(draft.kind) {
            tracing::debug!(user_id = %draft.user_id, kind = %draft.kind, "Notification suppressed by preference");
            return Ok(CreateOutcome::Suppressed);
        }

        let now = self.clock.now();
        let scheduled_for = match request.scheduled_for {
            Some(at) => at,
            None => self.quiet_hours_deferral(&prefs, now)?.unwrap_or(now),
        };
        let group_key = request
            .group_key
            .unwrap_or_else(|| format!("grp-{}", Uuid::new_v4()));

        let notification = self
            .notifications
            .create(&build_notification(draft, &group_key, None, scheduled_for, now))
            .await?;

        let delay = if request.immediate || scheduled_for <= now {
            None
        } else {
            Some(scheduled_for - now)
        };
        self.queue
            .enqueue(
                names::NOTIFICATION_DISPATCH,
                names::PUSH_FANOUT,
                &PushFanoutPayload {
                    user_id: draft.user_id,
                    group_key: group_key.clone(),
                },
                delay,
                &self.queues.push_fanout.retry,
            )
            .await?;

        tracing::info!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            kind = %notification.kind,
            scheduled_for = %scheduled_for,
            "Notification created"
        );
        Ok(CreateOutcome::Created(notification))
    }

    /// Submit a batch. Items failing validation or preference checks are
    /// dropped, not errored; survivors travel as one `batch-ingest` job.
    pub async fn create_batch(
        &self,
        drafts: Vec<NotificationDraft>,
        delay: Option<Duration>,
    ) -> AppResult<BatchReceipt> {
        let batch_id = Uuid::new_v4();
        let group_key = format!("batch-{batch_id}");

        let mut survivors = Vec::with_capacity(drafts.len());
        let mut dropped = 0usize;
        let mut batching_delays: Vec<Option<i32>> = Vec::new();

        for draft in drafts {
            if validate_draft(&draft).is_err()
                || self.users.find_user(draft.user_id).await?.is_none()
            {
                dropped += 1;
                continue;
            }
            let prefs = self.load_preferences(draft.user_id).await?;
            if !prefs.kind_enabled(draft.kind) {
                dropped += 1;
                continue;
            }
            batching_delays.push(
                prefs
                    .batching_enabled
                    .then_some(prefs.batching_delay_seconds),
            );
            survivors.push(draft);
        }

        if survivors.is_empty() {
            return Ok(BatchReceipt {
                batch_id,
                group_key,
                accepted: 0,
                dropped,
                job_id: None,
            });
        }

        // Without an explicit delay, coalesce per the recipients' batching
        // preference; any recipient with batching off forces immediate
        // ingestion.
        let delay = delay.or_else(|| {
            batching_delays
                .iter()
                .copied()
                .collect::<Option<Vec<i32>>>()
                .and_then(|delays| delays.into_iter().max())
                .map(|secs| Duration::seconds(secs as i64))
        });

        let accepted = survivors.len();
        let job = self
            .queue
            .enqueue(
                names::NOTIFICATION_DISPATCH,
                names::BATCH_INGEST,
                &BatchIngestPayload {
                    batch_id,
                    group_key: group_key.clone(),
                    drafts: survivors,
                },
                delay,
                &self.queues.batch_ingest.retry,
            )
            .await?;

        tracing::info!(
            %batch_id,
            accepted,
            dropped,
            job_id = %job.id,
            "Batch submitted"
        );
        Ok(BatchReceipt {
            batch_id,
            group_key,
            accepted,
            dropped,
            job_id: Some(job.id),
        })
    }

    /// List notifications matching the query, newest first.
    pub async fn get_notifications(
        &self,
        query: NotificationQuery,
    ) -> AppResult<Page<Notification>> {
        let items = self.notifications.find(&query).await?;
        let total = self.notifications.count(&query).await?;
        Ok(Page::new(items, total, query.offset))
    }

    /// UNREAD → READ for one owned notification. `NotFound` covers both a
    /// missing row and one that is not owned or no longer unread.
    pub async fn mark_as_read(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let affected = self
            .notifications
            .mark_read(id, user_id, self.clock.now())
            .await?;
        if affected == 0 {
            return Err(AppError::not_found("Notification not found"));
        }
        Ok(())
    }

    /// UNREAD → READ for many owned notifications; returns how many actually
    /// transitioned. Partial success is expected.
    pub async fn mark_many_read(&self, ids: &[Uuid], user_id: Uuid) -> AppResult<u64> {
        self.notifications
            .mark_many_read(ids, user_id, self.clock.now())
            .await
    }

    /// Archive an owned notification.
    pub async fn archive(&self, id: Uuid, user_id: Uuid) -> AppResult<()> {
        let affected = self.notifications.archive(id, user_id).await?;
        if affected == 0 {
            return Err(AppError::not_found("Notification not found"));
        }
        Ok(())
    }

    /// Per-user counters from one grouped query.
    pub async fn stats(&self, user_id: Uuid) -> AppResult<NotificationStats> {
        let cells = self.notifications.status_counts(user_id).await?;
        let mut stats = NotificationStats {
            unread: 0,
            read: 0,
            total: 0,
            by_kind: HashMap::new(),
        };
        for cell in cells {
            stats.total += cell.count;
            *stats.by_kind.entry(cell.kind.as_str().to_string()).or_insert(0) += cell.count;
            match cell.status {
                NotificationStatus::Unread => stats.unread += cell.count,
                NotificationStatus::Read => stats.read += cell.count,
                _ => {}
            }
        }
        Ok(stats)
    }

    /// Register (or refresh and reactivate) a push subscription.
    pub async fn subscribe_push(
        &self,
        user_id: Uuid,
        request: SubscribePush,
    ) -> AppResult<PushSubscription> {
        if self.users.find_user(user_id).await?.is_none() {
            return Err(AppError::not_found("User not found"));
        }
        if request.endpoint.is_empty() {
            return Err(AppError::validation("Subscription endpoint is required"));
        }
        self.subscriptions
            .upsert(&PushSubscription {
                id: Uuid::new_v4(),
                user_id,
                endpoint: request.endpoint,
                p256dh_key: request.p256dh_key,
                auth_key: request.auth_key,
                user_agent: request.user_agent,
                is_active: true,
                last_used: None,
                created_at: self.clock.now(),
            })
            .await
    }

    /// Deactivate a push subscription, keeping its delivery history.
    pub async fn unsubscribe_push(&self, user_id: Uuid, endpoint: &str) -> AppResult<()> {
        self.subscriptions.deactivate(user_id, endpoint).await?;
        Ok(())
    }

    /// The user's preferences, created with defaults on first read.
    pub async fn get_preferences(&self, user_id: Uuid) -> AppResult<NotificationPreference> {
        match self.preferences.find_preferences(user_id).await? {
            Some(prefs) => Ok(prefs),
            None => {
                self.preferences
                    .upsert_preferences(&NotificationPreference::default_for_user(user_id))
                    .await
            }
        }
    }

    /// Replace the user's preferences. Changing digest settings rotates the
    /// digest chain id and enqueues the next build under the new chain;
    /// builds pending from the old chain no-op when they run, so the user
    /// never accumulates more than one live chain.
    pub async fn update_preferences(
        &self,
        prefs: NotificationPreference,
    ) -> AppResult<NotificationPreference> {
        validate_preferences(&prefs)?;
        let mut prefs = prefs;
        let previous = self.preferences.find_preferences(prefs.user_id).await?;
        let digest_changed = previous.as_ref().map_or(true, |p| {
            p.digest_enabled != prefs.digest_enabled
                || p.digest_frequency != prefs.digest_frequency
                || p.digest_time != prefs.digest_time
                || p.timezone != prefs.timezone
        });
        prefs.digest_chain_id = match &previous {
            Some(p) if !digest_changed => p.digest_chain_id,
            _ => Uuid::new_v4(),
        };
        let stored = self.preferences.upsert_preferences(&prefs).await?;

        if stored.digest_enabled && digest_changed {
            let now = self.clock.now();
            let next =
                quiet_hours::next_occurrence(now, &stored.timezone, &stored.digest_time)?;
            self.queue
                .enqueue(
                    names::NOTIFICATION_DISPATCH,
                    names::DIGEST_BUILD,
                    &DigestBuildPayload {
                        user_id: stored.user_id,
                        chain_id: stored.digest_chain_id,
                    },
                    Some(next - now),
                    &self.queues.digest_build.retry,
                )
                .await?;
            tracing::debug!(user_id = %stored.user_id, next_run = %next, "Digest rescheduled");
        }
        Ok(stored)
    }

    async fn load_preferences(&self, user_id: Uuid) -> AppResult<NotificationPreference> {
        Ok(self
            .preferences
            .find_preferences(user_id)
            .await?
            .unwrap_or_else(|| NotificationPreference::default_for_user(user_id)))
    }

    fn quiet_hours_deferral(
        &self,
        prefs: &NotificationPreference,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        match prefs.quiet_window() {
            Some((start, end)) => {
                quiet_hours::next_active_time(now, &prefs.timezone, start, end)
            }
            None => Ok(None),
        }
    }
}

fn validate_draft(draft: &NotificationDraft) -> AppResult<()> {
    if draft.title.trim().is_empty() {
        return Err(AppError::validation("Notification title is required"));
    }
    if draft.message.trim().is_empty() {
        return Err(AppError::validation("Notification message is required"));
    }
    Ok(())
}

fn validate_preferences(prefs: &NotificationPreference) -> AppResult<()> {
    quiet_hours::parse_timezone(&prefs.timezone)?;
    match (&prefs.quiet_hours_start, &prefs.quiet_hours_end) {
        (Some(start), Some(end)) => {
            quiet_hours::parse_hhmm(start)?;
            quiet_hours::parse_hhmm(end)?;
        }
        (None, None) => {}
        _ => {
            return Err(AppError::validation(
                "Quiet hours require both a start and an end",
            ));
        }
    }
    quiet_hours::parse_hhmm(&prefs.digest_time)?;
    if prefs.batching_delay_seconds < 0 {
        return Err(AppError::validation("Batching delay must be non-negative"));
    }
    Ok(())
}

fn build_notification(
    draft: &NotificationDraft,
    group_key: &str,
    batch_id: Option<Uuid>,
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        user_id: draft.user_id,
        kind: draft.kind,
        title: draft.title.clone(),
        message: draft.message.clone(),
        action_url: draft.action_url.clone(),
        action_text: draft.action_text.clone(),
        data: draft.data.clone().map(Json),
        priority: draft.priority,
        status: NotificationStatus::Unread,
        scheduled_for,
        expires_at: draft.expires_at,
        group_key: group_key.to_string(),
        batch_id,
        push_sent: false,
        delivered: false,
        delivered_at: None,
        created_at: now,
        read_at: None,
    }
}

/// Build a notification row from a batch draft; shared with the
/// batch-ingest processor so both paths persist identical rows.
pub fn notification_from_draft(
    draft: &NotificationDraft,
    group_key: &str,
    batch_id: Uuid,
    now: DateTime<Utc>,
) -> Notification {
    build_notification(draft, group_key, Some(batch_id), now, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifyhub_entity::notification::NotificationKind;
    use notifyhub_test_utils::{
        FixedClock, MemoryJobStore, MemoryNotificationStore, MemoryPreferenceStore,
        MemorySubscriptionStore, MemoryUserStore,
    };

    struct Harness {
        service: NotificationService,
        users: Arc<MemoryUserStore>,
        preferences: Arc<MemoryPreferenceStore>,
        notifications: Arc<MemoryNotificationStore>,
        jobs: Arc<MemoryJobStore>,
        clock: Arc<FixedClock>,
    }

    fn harness() -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let preferences = Arc::new(MemoryPreferenceStore::new());
        let notifications = Arc::new(MemoryNotificationStore::new());
        let subscriptions = Arc::new(MemorySubscriptionStore::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let clock = Arc::new(FixedClock::at("2026-03-02T12:00:00Z"));
        let queue = JobQueue::new(jobs.clone(), clock.clone());
        let service = NotificationService::new(
            users.clone(),
            preferences.clone(),
            notifications.clone(),
            subscriptions,
            queue,
            QueuesConfig::default(),
            clock.clone(),
        );
        Harness {
            service,
            users,
            preferences,
            notifications,
            jobs,
            clock,
        }
    }

    fn draft(user_id: Uuid) -> NotificationDraft {
        NotificationDraft::new(
            user_id,
            NotificationKind::Assignment,
            "Assignment posted",
            "Lab 3 is now available",
        )
    }

    #[tokio::test]
    async fn create_persists_and_enqueues_fanout() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");

        let outcome = h
            .service
            .create_notification(CreateNotification::new(draft(user)))
            .await
            .unwrap();
        let created = outcome.created().unwrap();
        assert_eq!(created.status, NotificationStatus::Unread);
        assert!(created.group_key.starts_with("grp-"));

        let jobs = h.jobs.all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, names::PUSH_FANOUT);
        assert_eq!(jobs[0].scheduled_at, h.clock.now());
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let h = harness();
        let err = h
            .service
            .create_notification(CreateNotification::new(draft(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert_eq!(err.kind, notifyhub_core::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn disabled_kind_is_suppressed_silently() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs
            .kind_preferences
            .0
            .insert(NotificationKind::Assignment, false);
        h.preferences.seed(prefs);

        let outcome = h
            .service
            .create_notification(CreateNotification::new(draft(user)))
            .await
            .unwrap();
        assert!(matches!(outcome, CreateOutcome::Suppressed));
        assert!(h.notifications.all().is_empty());
        assert!(h.jobs.all().is_empty());
    }

    #[tokio::test]
    async fn overnight_quiet_hours_defer_dispatch() {
        let h = harness();
        h.clock.set(
            DateTime::parse_from_rfc3339("2026-03-02T23:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let user = h.users.add("a@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.quiet_hours_start = Some("22:00".to_string());
        prefs.quiet_hours_end = Some("06:00".to_string());
        h.preferences.seed(prefs);

        let created = h
            .service
            .create_notification(CreateNotification::new(draft(user)))
            .await
            .unwrap()
            .created()
            .unwrap();

        let expected = DateTime::parse_from_rfc3339("2026-03-03T06:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(created.scheduled_for, expected);
        assert_eq!(h.jobs.all()[0].scheduled_at, expected);
    }

    #[tokio::test]
    async fn explicit_schedule_overrides_quiet_hours() {
        let h = harness();
        h.clock.set(
            DateTime::parse_from_rfc3339("2026-03-02T23:30:00Z")
                .unwrap()
                .with_timezone(&Utc),
        );
        let user = h.users.add("a@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.quiet_hours_start = Some("22:00".to_string());
        prefs.quiet_hours_end = Some("06:00".to_string());
        h.preferences.seed(prefs);

        let at = h.clock.now() + Duration::minutes(5);
        let created = h
            .service
            .create_notification(CreateNotification::new(draft(user)).scheduled_for(at))
            .await
            .unwrap()
            .created()
            .unwrap();
        assert_eq!(created.scheduled_for, at);
    }

    #[tokio::test]
    async fn immediate_flag_skips_the_delay() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let at = h.clock.now() + Duration::hours(2);

        h.service
            .create_notification(
                CreateNotification::new(draft(user))
                    .scheduled_for(at)
                    .immediate(),
            )
            .await
            .unwrap();
        assert_eq!(h.jobs.all()[0].scheduled_at, h.clock.now());
    }

    #[tokio::test]
    async fn mark_as_read_succeeds_once_then_not_found() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let created = h
            .service
            .create_notification(CreateNotification::new(draft(user)))
            .await
            .unwrap()
            .created()
            .unwrap();

        h.service.mark_as_read(created.id, user).await.unwrap();
        let err = h.service.mark_as_read(created.id, user).await.unwrap_err();
        assert_eq!(err.kind, notifyhub_core::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn other_users_rows_look_missing() {
        let h = harness();
        let owner = h.users.add("a@example.com", "Avery");
        let intruder = h.users.add("b@example.com", "Blair");
        let created = h
            .service
            .create_notification(CreateNotification::new(draft(owner)))
            .await
            .unwrap()
            .created()
            .unwrap();

        let err = h
            .service
            .mark_as_read(created.id, intruder)
            .await
            .unwrap_err();
        assert_eq!(err.kind, notifyhub_core::error::ErrorKind::NotFound);
        assert!(h.service.archive(created.id, intruder).await.is_err());
    }

    #[tokio::test]
    async fn mark_many_counts_only_transitions() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let first = h
            .service
            .create_notification(CreateNotification::new(draft(user)))
            .await
            .unwrap()
            .created()
            .unwrap();
        let second = h
            .service
            .create_notification(CreateNotification::new(draft(user)))
            .await
            .unwrap()
            .created()
            .unwrap();
        h.service.mark_as_read(first.id, user).await.unwrap();

        let count = h
            .service
            .mark_many_read(&[first.id, second.id, Uuid::new_v4()], user)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn stats_aggregate_by_status_and_kind() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        for _ in 0..3 {
            h.service
                .create_notification(CreateNotification::new(draft(user)))
                .await
                .unwrap();
        }
        let read_one = h.notifications.all()[0].id;
        h.service.mark_as_read(read_one, user).await.unwrap();

        let stats = h.service.stats(user).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.unread, 2);
        assert_eq!(stats.read, 1);
        assert_eq!(stats.by_kind.get("assignment"), Some(&3));
    }

    #[tokio::test]
    async fn batch_drops_suppressed_items_and_enqueues_one_job() {
        let h = harness();
        let enabled_a = h.users.add("a@example.com", "Avery");
        let enabled_b = h.users.add("b@example.com", "Blair");
        let enabled_c = h.users.add("c@example.com", "Casey");
        let disabled_a = h.users.add("d@example.com", "Drew");
        let disabled_b = h.users.add("e@example.com", "Emery");
        for user in [disabled_a, disabled_b] {
            let mut prefs = NotificationPreference::default_for_user(user);
            prefs
                .kind_preferences
                .0
                .insert(NotificationKind::Assignment, false);
            h.preferences.seed(prefs);
        }

        let receipt = h
            .service
            .create_batch(
                vec![
                    draft(enabled_a),
                    draft(enabled_b),
                    draft(enabled_c),
                    draft(disabled_a),
                    draft(disabled_b),
                ],
                Some(Duration::zero()),
            )
            .await
            .unwrap();

        assert_eq!(receipt.accepted, 3);
        assert_eq!(receipt.dropped, 2);
        let jobs = h.jobs.all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, names::BATCH_INGEST);
        let payload: BatchIngestPayload = serde_json::from_value(jobs[0].payload.clone()).unwrap();
        assert_eq!(payload.batch_id, receipt.batch_id);
        assert_eq!(payload.drafts.len(), 3);
    }

    #[tokio::test]
    async fn batch_defaults_delay_from_batching_preferences() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");

        let receipt = h.service.create_batch(vec![draft(user)], None).await.unwrap();
        assert_eq!(receipt.accepted, 1);
        // Default preferences batch with a 300s delay.
        let job = h.jobs.all().remove(0);
        assert_eq!(job.scheduled_at, h.clock.now() + Duration::seconds(300));
    }

    #[tokio::test]
    async fn empty_batch_enqueues_nothing() {
        let h = harness();
        let receipt = h
            .service
            .create_batch(vec![draft(Uuid::new_v4())], None)
            .await
            .unwrap();
        assert_eq!(receipt.accepted, 0);
        assert_eq!(receipt.dropped, 1);
        assert!(receipt.job_id.is_none());
        assert!(h.jobs.all().is_empty());
    }

    #[tokio::test]
    async fn listing_pages_newest_first() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        for i in 0..5 {
            h.clock.advance_secs(60);
            let mut d = draft(user);
            d.title = format!("n{i}");
            h.service
                .create_notification(CreateNotification::new(d))
                .await
                .unwrap();
        }

        let page = h
            .service
            .get_notifications(NotificationQuery::for_user(user).window(2, 0))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert!(page.has_more);
        assert_eq!(page.items[0].title, "n4");

        let rest = h
            .service
            .get_notifications(NotificationQuery::for_user(user).window(10, 4))
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert!(!rest.has_more);
    }

    #[tokio::test]
    async fn preferences_default_on_first_read() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let prefs = h.service.get_preferences(user).await.unwrap();
        assert!(prefs.push_enabled);
        assert_eq!(prefs.timezone, "UTC");
        // First read persists the defaults.
        assert!(h
            .preferences
            .find_preferences(user)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn enabling_digests_schedules_the_next_build() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.digest_enabled = true;
        prefs.digest_time = "08:00".to_string();

        h.service.update_preferences(prefs).await.unwrap();

        let jobs = h.jobs.all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_type, names::DIGEST_BUILD);
        // 12:00 now, 08:00 digest time: next run is tomorrow morning.
        let expected = DateTime::parse_from_rfc3339("2026-03-03T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(jobs[0].scheduled_at, expected);
    }

    #[tokio::test]
    async fn changing_digest_settings_rotates_the_chain() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.digest_enabled = true;
        let first = h.service.update_preferences(prefs).await.unwrap();

        let mut changed = first.clone();
        changed.digest_time = "09:00".to_string();
        let second = h.service.update_preferences(changed).await.unwrap();
        assert_ne!(first.digest_chain_id, second.digest_chain_id);

        // The pending build from the first chain is now orphaned; only the
        // second chain's id matches the stored preferences.
        let jobs = h.jobs.all();
        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs[1].payload["chain_id"],
            serde_json::json!(second.digest_chain_id)
        );

        // A non-digest change keeps the chain and enqueues nothing.
        let mut unrelated = second.clone();
        unrelated.push_enabled = false;
        let third = h.service.update_preferences(unrelated).await.unwrap();
        assert_eq!(second.digest_chain_id, third.digest_chain_id);
        assert_eq!(h.jobs.all().len(), 2);
    }

    #[tokio::test]
    async fn bad_preferences_are_rejected() {
        let h = harness();
        let user = h.users.add("a@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.timezone = "Nowhere/Nope".to_string();
        assert!(h.service.update_preferences(prefs).await.is_err());

        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.quiet_hours_start = Some("22:00".to_string());
        assert!(h.service.update_preferences(prefs).await.is_err());
    }
}
