//! Digest build job handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use notifyhub_core::clock::Clock;
use notifyhub_core::config::RetryPolicy;
use notifyhub_database::stores::{NotificationStore, PreferenceStore, UserStore};
use notifyhub_entity::job::model::Job;
use notifyhub_entity::job::payload::{DigestBuildPayload, SendEmailPayload};
use notifyhub_entity::notification::{DigestFrequency, NotificationPreference};
use notifyhub_queue::{names, JobQueue};
use notifyhub_service::notification::quiet_hours;

use crate::executor::{JobExecutionError, JobHandler};

/// At most this many notifications appear in one digest email.
const DIGEST_ITEM_LIMIT: i64 = 50;

/// Builds one user's digest email and schedules the next build.
///
/// The digest chain is self-perpetuating while digests stay enabled:
/// every run enqueues the next one at the user's configured local time.
/// A run that finds digests disabled, or whose chain id no longer matches
/// the stored preferences, completes without rescheduling, which is how a
/// chain dies; preference updates rotate the chain id and start a fresh
/// chain, so each user has at most one live chain.
pub struct DigestBuildHandler {
    users: Arc<dyn UserStore>,
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
    queue: JobQueue,
    send_email_retry: RetryPolicy,
    digest_build_retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl DigestBuildHandler {
    /// Create a new digest build handler.
    pub fn new(
        users: Arc<dyn UserStore>,
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
        queue: JobQueue,
        send_email_retry: RetryPolicy,
        digest_build_retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            preferences,
            notifications,
            queue,
            send_email_retry,
            digest_build_retry,
            clock,
        }
    }

    /// Enqueue the next build of this user's digest chain.
    async fn schedule_next(
        &self,
        user_id: uuid::Uuid,
        prefs: &NotificationPreference,
    ) -> Result<chrono::DateTime<chrono::Utc>, JobExecutionError> {
        let now = self.clock.now();
        // A weekly digest recurs on a fixed cadence: the next build is the
        // first configured time of day at least six days out.
        let from = match prefs.digest_frequency {
            DigestFrequency::Daily => now,
            DigestFrequency::Weekly => now + chrono::Duration::days(6),
        };
        let next = quiet_hours::next_occurrence(from, &prefs.timezone, &prefs.digest_time)?;
        self.queue
            .enqueue(
                names::NOTIFICATION_DISPATCH,
                names::DIGEST_BUILD,
                &DigestBuildPayload {
                    user_id,
                    chain_id: prefs.digest_chain_id,
                },
                Some(next - now),
                &self.digest_build_retry,
            )
            .await?;
        Ok(next)
    }
}

#[async_trait]
impl JobHandler for DigestBuildHandler {
    fn job_type(&self) -> &str {
        names::DIGEST_BUILD
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let payload: DigestBuildPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid digest payload: {e}")))?;

        let prefs = self
            .preferences
            .find_preferences(payload.user_id)
            .await?
            .unwrap_or_else(|| NotificationPreference::default_for_user(payload.user_id));
        if !prefs.digest_enabled || !prefs.email_enabled {
            tracing::info!(user_id = %payload.user_id, "Digest disabled, ending chain");
            return Ok(Some(serde_json::json!({ "skipped": "digest_disabled" })));
        }
        if payload.chain_id != prefs.digest_chain_id {
            tracing::info!(user_id = %payload.user_id, "Digest settings changed since this build was scheduled, ending chain");
            return Ok(Some(serde_json::json!({ "skipped": "stale_chain" })));
        }

        let user = self
            .users
            .find_user(payload.user_id)
            .await?
            .ok_or_else(|| {
                JobExecutionError::Permanent(format!("No such user {}", payload.user_id))
            })?;

        let now = self.clock.now();
        let window = prefs.digest_frequency.window();
        let rows = self
            .notifications
            .find_unread_in_window(payload.user_id, now - window, now, DIGEST_ITEM_LIMIT)
            .await?;

        let period = match prefs.digest_frequency {
            DigestFrequency::Daily => "daily",
            DigestFrequency::Weekly => "weekly",
        };

        let mut emailed = 0usize;
        if rows.is_empty() {
            tracing::info!(user_id = %user.id, "No unread notifications, skipping digest email");
        } else {
            let mut by_kind: Vec<(&str, usize)> = Vec::new();
            for row in &rows {
                match by_kind.iter_mut().find(|(k, _)| *k == row.kind.as_str()) {
                    Some((_, count)) => *count += 1,
                    None => by_kind.push((row.kind.as_str(), 1)),
                }
            }
            let email = SendEmailPayload {
                to: user.email.clone(),
                subject: format!("Your {period} digest"),
                template: "digest".to_string(),
                data: serde_json::json!({
                    "display_name": user.display_name,
                    "period": period,
                    "total": rows.len(),
                    "notifications": rows
                        .iter()
                        .map(|n| serde_json::json!({
                            "title": n.title,
                            "message": n.message,
                            "kind": n.kind.as_str(),
                        }))
                        .collect::<Vec<_>>(),
                    "counts": by_kind
                        .iter()
                        .map(|(k, c)| (k.to_string(), serde_json::json!(c)))
                        .collect::<serde_json::Map<_, _>>(),
                }),
            };
            self.queue
                .enqueue(
                    names::EMAIL_DISPATCH,
                    names::SEND_EMAIL,
                    &email,
                    None,
                    &self.send_email_retry,
                )
                .await?;
            emailed = rows.len();
        }

        let next_run = self.schedule_next(user.id, &prefs).await?;
        tracing::info!(user_id = %user.id, emailed, next_run = %next_run, "Digest built");
        Ok(Some(serde_json::json!({
            "emailed": emailed,
            "next_run": next_run,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::claimed_job;
    use chrono::Duration;
    use notifyhub_core::clock::Clock;
    use notifyhub_entity::notification::{NotificationDraft, NotificationKind};
    use notifyhub_service::notification::service::notification_from_draft;
    use notifyhub_test_utils::{
        FixedClock, MemoryJobStore, MemoryNotificationStore, MemoryPreferenceStore,
        MemoryUserStore,
    };
    use uuid::Uuid;

    struct Harness {
        handler: DigestBuildHandler,
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
        let jobs = Arc::new(MemoryJobStore::new());
        let clock = Arc::new(FixedClock::at("2026-03-02T12:00:00Z"));
        let queue = JobQueue::new(jobs.clone(), clock.clone());
        let retry = RetryPolicy {
            max_attempts: 3,
            backoff_base_secs: 2,
        };
        let handler = DigestBuildHandler::new(
            users.clone(),
            preferences.clone(),
            notifications.clone(),
            queue,
            retry,
            retry,
            clock.clone(),
        );
        Harness {
            handler,
            users,
            preferences,
            notifications,
            jobs,
            clock,
        }
    }

    fn enable_digest(h: &Harness, user: Uuid) -> Uuid {
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.digest_enabled = true;
        let chain = prefs.digest_chain_id;
        h.preferences.seed(prefs);
        chain
    }

    async fn seed_unread(h: &Harness, user: Uuid, title: &str, age: Duration) {
        let draft = NotificationDraft::new(user, NotificationKind::Assignment, title, "body");
        h.notifications
            .create(&notification_from_draft(
                &draft,
                &format!("grp-{title}"),
                Uuid::new_v4(),
                h.clock.now() - age,
            ))
            .await
            .unwrap();
    }

    fn digest_job(user: Uuid, chain: Uuid) -> Job {
        claimed_job(
            names::NOTIFICATION_DISPATCH,
            names::DIGEST_BUILD,
            serde_json::json!({ "user_id": user, "chain_id": chain }),
        )
    }

    fn utc(s: &str) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    #[tokio::test]
    async fn only_window_unread_rows_enter_the_digest() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        let chain = enable_digest(&h, user);
        seed_unread(&h, user, "recent", Duration::hours(2)).await;
        seed_unread(&h, user, "stale", Duration::days(3)).await;
        seed_unread(&h, user, "read", Duration::hours(1)).await;
        let read_id = h
            .notifications
            .all()
            .into_iter()
            .find(|n| n.title == "read")
            .unwrap()
            .id;
        h.notifications
            .mark_read(read_id, user, h.clock.now())
            .await
            .unwrap();

        let result = h
            .handler
            .execute(&digest_job(user, chain))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["emailed"], 1);

        let email = h
            .jobs
            .all()
            .into_iter()
            .find(|j| j.job_type == names::SEND_EMAIL)
            .unwrap();
        assert_eq!(email.payload["to"], "avery@example.com");
        assert_eq!(email.payload["subject"], "Your daily digest");
        assert_eq!(email.payload["data"]["total"], 1);
        assert_eq!(
            email.payload["data"]["notifications"][0]["title"],
            "recent"
        );
        assert_eq!(email.payload["data"]["counts"]["assignment"], 1);
    }

    #[tokio::test]
    async fn digest_items_are_capped() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        let chain = enable_digest(&h, user);
        for i in 0..55 {
            seed_unread(&h, user, &format!("n{i}"), Duration::minutes(i)).await;
        }

        let result = h
            .handler
            .execute(&digest_job(user, chain))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["emailed"], 50);
    }

    #[tokio::test]
    async fn disabled_digest_ends_the_chain() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        seed_unread(&h, user, "recent", Duration::hours(1)).await;

        let result = h
            .handler
            .execute(&digest_job(user, Uuid::new_v4()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["skipped"], "digest_disabled");
        assert!(h.jobs.all().is_empty());
    }

    #[tokio::test]
    async fn empty_digest_still_schedules_the_next_build() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        let chain = enable_digest(&h, user);

        let result = h
            .handler
            .execute(&digest_job(user, chain))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["emailed"], 0);

        let jobs = h.jobs.all();
        assert!(jobs.iter().all(|j| j.job_type != names::SEND_EMAIL));
        let next = jobs
            .iter()
            .find(|j| j.job_type == names::DIGEST_BUILD)
            .unwrap();
        // Default digest time is 08:00 UTC; from noon that is tomorrow.
        assert_eq!(next.scheduled_at, utc("2026-03-03T08:00:00Z"));
    }

    #[tokio::test]
    async fn weekly_digest_schedules_about_a_week_out() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.digest_enabled = true;
        prefs.digest_frequency = DigestFrequency::Weekly;
        let chain = prefs.digest_chain_id;
        h.preferences.seed(prefs);

        h.handler.execute(&digest_job(user, chain)).await.unwrap();
        let next = h
            .jobs
            .all()
            .into_iter()
            .find(|j| j.job_type == names::DIGEST_BUILD)
            .unwrap();
        // Six days out lands on 2026-03-08 12:00; 08:00 has passed there,
        // so the next occurrence is the morning of the 9th.
        assert_eq!(next.scheduled_at, utc("2026-03-09T08:00:00Z"));
    }

    #[tokio::test]
    async fn build_from_a_superseded_chain_is_a_noop() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        enable_digest(&h, user);
        seed_unread(&h, user, "recent", Duration::hours(1)).await;

        // The job was scheduled before the user changed digest settings.
        let result = h
            .handler
            .execute(&digest_job(user, Uuid::new_v4()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["skipped"], "stale_chain");
        assert!(h.jobs.all().is_empty());
    }

    #[tokio::test]
    async fn notification_created_at_the_run_instant_is_included() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        let chain = enable_digest(&h, user);
        seed_unread(&h, user, "just now", Duration::zero()).await;

        let result = h
            .handler
            .execute(&digest_job(user, chain))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["emailed"], 1);
    }

    #[tokio::test]
    async fn weekly_window_reaches_back_a_full_week() {
        let h = harness();
        let user = h.users.add("avery@example.com", "Avery");
        let mut prefs = NotificationPreference::default_for_user(user);
        prefs.digest_enabled = true;
        prefs.digest_frequency = DigestFrequency::Weekly;
        let chain = prefs.digest_chain_id;
        h.preferences.seed(prefs);
        seed_unread(&h, user, "midweek", Duration::days(2)).await;
        seed_unread(&h, user, "last week", Duration::days(8)).await;

        let result = h
            .handler
            .execute(&digest_job(user, chain))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result["emailed"], 1);

        let email = h
            .jobs
            .all()
            .into_iter()
            .find(|j| j.job_type == names::SEND_EMAIL)
            .unwrap();
        assert_eq!(email.payload["subject"], "Your weekly digest");
        assert_eq!(
            email.payload["data"]["notifications"][0]["title"],
            "midweek"
        );
    }
}
