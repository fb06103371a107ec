//! Batch ingest job handler.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use notifyhub_core::clock::Clock;
use notifyhub_core::config::RetryPolicy;
use notifyhub_database::stores::{
    NotificationStore, PreferenceStore, SubscriptionStore, UserStore,
};
use notifyhub_entity::job::model::Job;
use notifyhub_entity::job::payload::{BatchIngestPayload, PushFanoutPayload};
use notifyhub_entity::notification::{NotificationDraft, NotificationPreference};
use notifyhub_queue::{names, JobQueue};
use notifyhub_service::notification::service::notification_from_draft;

use crate::executor::{JobExecutionError, JobHandler};

/// Persists the surviving drafts of a batch submission and fans out to
/// push subscribers.
///
/// Drafts are re-validated at processing time: a user deleted or a kind
/// opted out between acceptance and processing drops the draft here
/// rather than failing the whole batch. Reprocessing a batch whose rows
/// already landed is a no-op, so duplicate deliveries of the same job
/// do not duplicate notifications.
pub struct BatchIngestHandler {
    users: Arc<dyn UserStore>,
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    queue: JobQueue,
    fanout_retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl BatchIngestHandler {
    /// Create a new batch ingest handler.
    pub fn new(
        users: Arc<dyn UserStore>,
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        queue: JobQueue,
        fanout_retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            preferences,
            notifications,
            subscriptions,
            queue,
            fanout_retry,
            clock,
        }
    }

    async fn draft_survives(&self, draft: &NotificationDraft) -> Result<bool, JobExecutionError> {
        if self.users.find_user(draft.user_id).await?.is_none() {
            return Ok(false);
        }
        let prefs = self
            .preferences
            .find_preferences(draft.user_id)
            .await?
            .unwrap_or_else(|| NotificationPreference::default_for_user(draft.user_id));
        Ok(prefs.kind_enabled(draft.kind))
    }
}

#[async_trait]
impl JobHandler for BatchIngestHandler {
    fn job_type(&self) -> &str {
        names::BATCH_INGEST
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let payload: BatchIngestPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid batch payload: {e}")))?;

        let existing = self.notifications.find_by_group(&payload.group_key).await?;
        if existing
            .iter()
            .any(|n| n.batch_id == Some(payload.batch_id))
        {
            tracing::info!(batch_id = %payload.batch_id, "Batch already ingested");
            return Ok(Some(serde_json::json!({
                "skipped": "already_ingested",
                "persisted": 0,
            })));
        }

        let now = self.clock.now();
        let mut persisted_users: Vec<uuid::Uuid> = Vec::new();
        let mut seen = HashSet::new();
        let mut persisted = 0usize;
        let mut dropped = 0usize;
        for draft in &payload.drafts {
            if !self.draft_survives(draft).await? {
                dropped += 1;
                continue;
            }
            self.notifications
                .create(&notification_from_draft(
                    draft,
                    &payload.group_key,
                    payload.batch_id,
                    now,
                ))
                .await?;
            persisted += 1;
            if seen.insert(draft.user_id) {
                persisted_users.push(draft.user_id);
            }
        }

        let mut fanout_jobs = 0usize;
        for user_id in persisted_users {
            if self.subscriptions.find_active(user_id).await?.is_empty() {
                continue;
            }
            self.queue
                .enqueue(
                    names::NOTIFICATION_DISPATCH,
                    names::PUSH_FANOUT,
                    &PushFanoutPayload {
                        user_id,
                        group_key: payload.group_key.clone(),
                    },
                    None,
                    &self.fanout_retry,
                )
                .await?;
            fanout_jobs += 1;
        }

        tracing::info!(
            batch_id = %payload.batch_id,
            persisted,
            dropped,
            fanout_jobs,
            "Batch ingested"
        );
        Ok(Some(serde_json::json!({
            "persisted": persisted,
            "dropped": dropped,
            "fanout_jobs": fanout_jobs,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::claimed_job;
    use notifyhub_entity::notification::{NotificationKind, PushSubscription};
    use notifyhub_test_utils::{
        FixedClock, MemoryJobStore, MemoryNotificationStore, MemoryPreferenceStore,
        MemorySubscriptionStore, MemoryUserStore,
    };
    use uuid::Uuid;

    struct Harness {
        handler: BatchIngestHandler,
        users: Arc<MemoryUserStore>,
        preferences: Arc<MemoryPreferenceStore>,
        notifications: Arc<MemoryNotificationStore>,
        subscriptions: Arc<MemorySubscriptionStore>,
        jobs: Arc<MemoryJobStore>,
    }

    fn harness() -> Harness {
        let users = Arc::new(MemoryUserStore::new());
        let preferences = Arc::new(MemoryPreferenceStore::new());
        let notifications = Arc::new(MemoryNotificationStore::new());
        let subscriptions = Arc::new(MemorySubscriptionStore::new());
        let jobs = Arc::new(MemoryJobStore::new());
        let clock = Arc::new(FixedClock::at("2026-03-02T12:00:00Z"));
        let queue = JobQueue::new(jobs.clone(), clock.clone());
        let handler = BatchIngestHandler::new(
            users.clone(),
            preferences.clone(),
            notifications.clone(),
            subscriptions.clone(),
            queue,
            RetryPolicy {
                max_attempts: 3,
                backoff_base_secs: 2,
            },
            clock,
        );
        Harness {
            handler,
            users,
            preferences,
            notifications,
            subscriptions,
            jobs,
        }
    }

    async fn subscribe(h: &Harness, user: Uuid) {
        h.subscriptions
            .upsert(&PushSubscription {
                id: Uuid::new_v4(),
                user_id: user,
                endpoint: format!("https://push/{user}"),
                p256dh_key: "p256dh".to_string(),
                auth_key: "auth".to_string(),
                user_agent: None,
                is_active: true,
                last_used: None,
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
    }

    fn ingest_job(batch_id: Uuid, group_key: &str, drafts: &[NotificationDraft]) -> Job {
        claimed_job(
            names::NOTIFICATION_DISPATCH,
            names::BATCH_INGEST,
            serde_json::json!({
                "batch_id": batch_id,
                "group_key": group_key,
                "drafts": drafts,
            }),
        )
    }

    #[tokio::test]
    async fn invalid_drafts_drop_without_failing_the_batch() {
        let h = harness();
        let alice = h.users.add("alice@example.com", "Alice");
        let bob = h.users.add("bob@example.com", "Bob");
        let mut bob_prefs = NotificationPreference::default_for_user(bob);
        bob_prefs
            .kind_preferences
            .0
            .insert(NotificationKind::Gamification, false);
        h.preferences.seed(bob_prefs);

        let drafts = vec![
            NotificationDraft::new(alice, NotificationKind::Course, "A", "a"),
            NotificationDraft::new(Uuid::new_v4(), NotificationKind::Course, "Ghost", "g"),
            NotificationDraft::new(bob, NotificationKind::Gamification, "Badge", "b"),
        ];
        let result = h
            .handler
            .execute(&ingest_job(Uuid::new_v4(), "batch-1", &drafts))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result["persisted"], 1);
        assert_eq!(result["dropped"], 2);
        let rows = h.notifications.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].user_id, alice);
        assert_eq!(rows[0].group_key, "batch-1");
        assert!(rows[0].batch_id.is_some());
    }

    #[tokio::test]
    async fn fanout_enqueued_only_for_users_with_subscriptions() {
        let h = harness();
        let alice = h.users.add("alice@example.com", "Alice");
        let bob = h.users.add("bob@example.com", "Bob");
        subscribe(&h, alice).await;

        let drafts = vec![
            NotificationDraft::new(alice, NotificationKind::Course, "A1", "a"),
            NotificationDraft::new(alice, NotificationKind::Course, "A2", "a"),
            NotificationDraft::new(bob, NotificationKind::Course, "B1", "b"),
        ];
        let result = h
            .handler
            .execute(&ingest_job(Uuid::new_v4(), "batch-1", &drafts))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result["persisted"], 3);
        assert_eq!(result["fanout_jobs"], 1);
        let fanouts: Vec<_> = h
            .jobs
            .all()
            .into_iter()
            .filter(|j| j.job_type == names::PUSH_FANOUT)
            .collect();
        assert_eq!(fanouts.len(), 1);
        assert_eq!(fanouts[0].payload["user_id"], serde_json::json!(alice));
        assert_eq!(fanouts[0].payload["group_key"], "batch-1");
    }

    #[tokio::test]
    async fn reprocessing_an_ingested_batch_is_a_noop() {
        let h = harness();
        let alice = h.users.add("alice@example.com", "Alice");
        subscribe(&h, alice).await;
        let batch_id = Uuid::new_v4();
        let drafts = vec![NotificationDraft::new(
            alice,
            NotificationKind::Course,
            "A",
            "a",
        )];

        let job = ingest_job(batch_id, "batch-1", &drafts);
        h.handler.execute(&job).await.unwrap();
        let result = h.handler.execute(&job).await.unwrap().unwrap();

        assert_eq!(result["skipped"], "already_ingested");
        assert_eq!(h.notifications.all().len(), 1);
        let fanouts = h
            .jobs
            .all()
            .into_iter()
            .filter(|j| j.job_type == names::PUSH_FANOUT)
            .count();
        assert_eq!(fanouts, 1);
    }
}
