//! Archived-notification sweep job handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use notifyhub_core::clock::Clock;
use notifyhub_database::stores::NotificationStore;
use notifyhub_entity::job::model::Job;
use notifyhub_entity::job::payload::SweepArchivedPayload;
use notifyhub_queue::names;

use crate::executor::{JobExecutionError, JobHandler};

/// Deletes archived notifications past their retention age.
pub struct SweepArchivedHandler {
    notifications: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
}

impl SweepArchivedHandler {
    /// Create a new sweep handler.
    pub fn new(notifications: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifications,
            clock,
        }
    }
}

#[async_trait]
impl JobHandler for SweepArchivedHandler {
    fn job_type(&self) -> &str {
        names::SWEEP_ARCHIVED
    }

    async fn execute(&self, job: &Job) -> Result<Option<Value>, JobExecutionError> {
        let payload: SweepArchivedPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| JobExecutionError::Permanent(format!("Invalid sweep payload: {e}")))?;
        if payload.max_age_days < 0 {
            return Err(JobExecutionError::Permanent(format!(
                "Negative retention age {}",
                payload.max_age_days
            )));
        }

        let cutoff = self.clock.now() - chrono::Duration::days(payload.max_age_days);
        let deleted = self.notifications.delete_archived_before(cutoff).await?;
        tracing::info!(deleted, %cutoff, "Swept archived notifications");
        Ok(Some(serde_json::json!({
            "deleted": deleted,
            "cutoff": cutoff,
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
    use notifyhub_test_utils::{FixedClock, MemoryNotificationStore};
    use uuid::Uuid;

    fn sweep_job(max_age_days: i64) -> Job {
        claimed_job(
            names::CLEANUP,
            names::SWEEP_ARCHIVED,
            serde_json::json!({ "max_age_days": max_age_days }),
        )
    }

    async fn seed(
        store: &MemoryNotificationStore,
        clock: &FixedClock,
        title: &str,
        age: Duration,
        archive: bool,
    ) {
        let user = Uuid::new_v4();
        let draft = NotificationDraft::new(user, NotificationKind::System, title, "body");
        let row = store
            .create(&notification_from_draft(
                &draft,
                &format!("grp-{title}"),
                Uuid::new_v4(),
                clock.now() - age,
            ))
            .await
            .unwrap();
        if archive {
            store.archive(row.id, user).await.unwrap();
        }
    }

    #[tokio::test]
    async fn deletes_only_archived_rows_past_the_cutoff() {
        let store = Arc::new(MemoryNotificationStore::new());
        let clock = Arc::new(FixedClock::at("2026-03-02T12:00:00Z"));
        seed(&store, &clock, "old-archived", Duration::days(120), true).await;
        seed(&store, &clock, "fresh-archived", Duration::days(10), true).await;
        seed(&store, &clock, "old-unread", Duration::days(120), false).await;

        let handler = SweepArchivedHandler::new(store.clone(), clock);
        let result = handler.execute(&sweep_job(90)).await.unwrap().unwrap();
        assert_eq!(result["deleted"], 1);

        let remaining: Vec<String> = store.all().into_iter().map(|n| n.title).collect();
        assert!(remaining.contains(&"fresh-archived".to_string()));
        assert!(remaining.contains(&"old-unread".to_string()));
        assert!(!remaining.contains(&"old-archived".to_string()));
    }

    #[tokio::test]
    async fn negative_retention_is_rejected() {
        let store = Arc::new(MemoryNotificationStore::new());
        let clock = Arc::new(FixedClock::at("2026-03-02T12:00:00Z"));
        let handler = SweepArchivedHandler::new(store, clock);

        let err = handler.execute(&sweep_job(-1)).await.unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(_)));
    }
}
