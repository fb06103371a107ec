//! The persistent job queue.
//!
//! Jobs are rows in Postgres; enqueueing is an insert and claiming is an
//! atomic `SKIP LOCKED` update, so the queue shares the service's
//! transactional guarantees and survives restarts. This crate owns the
//! queue/job-type names and the enqueue-side API; the execution side lives
//! in the worker crate.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use uuid::Uuid;

use notifyhub_core::clock::Clock;
use notifyhub_core::config::RetryPolicy;
use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_database::stores::{JobCounts, JobStore};
use notifyhub_entity::job::model::{Job, NewJob};

pub mod names {
    //! Queue and job-type identifiers.

    /// Queue for in-app fan-out, batch ingestion, and digest assembly.
    pub const NOTIFICATION_DISPATCH: &str = "notification-dispatch";
    /// Queue for outbound email.
    pub const EMAIL_DISPATCH: &str = "email-dispatch";
    /// Queue for maintenance work.
    pub const CLEANUP: &str = "cleanup";

    /// Deliver one notification group to a user's push subscriptions.
    pub const PUSH_FANOUT: &str = "push-fanout";
    /// Persist a validated batch of notification drafts.
    pub const BATCH_INGEST: &str = "batch-ingest";
    /// Render and enqueue one user's digest email.
    pub const DIGEST_BUILD: &str = "digest-build";
    /// Hand one rendered email to the SMTP relay.
    pub const SEND_EMAIL: &str = "send-email";
    /// Delete long-archived notifications.
    pub const SWEEP_ARCHIVED: &str = "sweep-archived";

    /// All (queue, job type) pairs the pipeline runs.
    pub const ALL: &[(&str, &str)] = &[
        (NOTIFICATION_DISPATCH, PUSH_FANOUT),
        (NOTIFICATION_DISPATCH, BATCH_INGEST),
        (NOTIFICATION_DISPATCH, DIGEST_BUILD),
        (EMAIL_DISPATCH, SEND_EMAIL),
        (CLEANUP, SWEEP_ARCHIVED),
    ];
}

/// Enqueue-side handle on the job store.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
}

impl JobQueue {
    /// Create a queue handle over a job store.
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Enqueue a job, optionally delayed, carrying its retry policy.
    pub async fn enqueue<P: Serialize>(
        &self,
        queue: &str,
        job_type: &str,
        payload: &P,
        delay: Option<Duration>,
        retry: &RetryPolicy,
    ) -> AppResult<Job> {
        let payload = serde_json::to_value(payload).map_err(|e| {
            AppError::with_source(ErrorKind::Serialization, "Failed to serialize job payload", e)
        })?;

        let scheduled_at = self.clock.now() + delay.unwrap_or_else(Duration::zero);
        let job = self
            .store
            .create(&NewJob {
                queue: queue.to_string(),
                job_type: job_type.to_string(),
                payload,
                max_attempts: retry.max_attempts,
                backoff_base_secs: retry.backoff_base_secs as i64,
                scheduled_at,
            })
            .await?;

        tracing::debug!(
            job_id = %job.id,
            queue = %job.queue,
            job_type = %job.job_type,
            scheduled_at = %job.scheduled_at,
            "Job enqueued"
        );
        Ok(job)
    }

    /// Claim the oldest eligible job of one type, if any.
    pub async fn claim(
        &self,
        queue: &str,
        job_type: &str,
        worker_id: &str,
    ) -> AppResult<Option<Job>> {
        self.store
            .claim_next(queue, job_type, worker_id, self.clock.now())
            .await
    }

    /// Mark a claimed job completed.
    pub async fn complete(&self, id: Uuid, result: Option<serde_json::Value>) -> AppResult<()> {
        self.store.complete(id, result, self.clock.now()).await
    }

    /// Mark a claimed job permanently failed.
    pub async fn fail(&self, id: Uuid, error: &str) -> AppResult<()> {
        self.store.fail(id, error, self.clock.now()).await
    }

    /// Return a claimed job to waiting after a backoff delay.
    pub async fn retry_later(&self, job: &Job, error: &str) -> AppResult<()> {
        let policy = RetryPolicy {
            max_attempts: job.max_attempts,
            backoff_base_secs: job.backoff_base_secs.max(0) as u64,
        };
        let delay = Duration::seconds(policy.backoff_delay_secs(job.attempts) as i64);
        let run_at = self.clock.now() + delay;
        self.store.reschedule(job.id, run_at, error).await
    }

    /// Job counts for one queue, with future-scheduled jobs as delayed.
    pub async fn counts(&self, queue: &str) -> AppResult<JobCounts> {
        self.store.counts(queue, self.clock.now()).await
    }
}
