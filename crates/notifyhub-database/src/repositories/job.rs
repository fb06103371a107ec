//! Job repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use notifyhub_core::error::{AppError, ErrorKind};
use notifyhub_core::result::AppResult;
use notifyhub_entity::job::model::{Job, NewJob};

use crate::stores::{JobCounts, JobStore};

/// Repository for the persistent job queue.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn create(&self, job: &NewJob) -> AppResult<Job> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (queue, job_type, payload, max_attempts, backoff_base_secs, \
              scheduled_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&job.queue)
        .bind(&job.job_type)
        .bind(&job.payload)
        .bind(job.max_attempts)
        .bind(job.backoff_base_secs)
        .bind(job.scheduled_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create job", e))
    }

    async fn claim_next(
        &self,
        queue: &str,
        job_type: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Job>> {
        // SKIP LOCKED keeps concurrent workers from claiming the same row.
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'active', started_at = $4, worker_id = $3, \
              attempts = attempts + 1, updated_at = $4 \
             WHERE id = ( \
                SELECT id FROM jobs \
                WHERE queue = $1 AND job_type = $2 AND status = 'waiting' \
                AND scheduled_at <= $4 \
                ORDER BY created_at ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING *",
        )
        .bind(queue)
        .bind(job_type)
        .bind(worker_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to claim job", e))
    }

    async fn complete(
        &self,
        id: Uuid,
        result: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'completed', result = $2, completed_at = $3, \
              updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(result)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to complete job", e))?;
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', error_message = $2, completed_at = $3, \
              updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to fail job", e))?;
        Ok(())
    }

    async fn reschedule(&self, id: Uuid, run_at: DateTime<Utc>, error: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'waiting', scheduled_at = $2, error_message = $3, \
              started_at = NULL, worker_id = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(run_at)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reschedule job", e))?;
        Ok(())
    }

    async fn counts(&self, queue: &str, now: DateTime<Utc>) -> AppResult<JobCounts> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            "SELECT \
              COUNT(*) FILTER (WHERE status = 'waiting' AND scheduled_at <= $2), \
              COUNT(*) FILTER (WHERE status = 'active'), \
              COUNT(*) FILTER (WHERE status = 'completed'), \
              COUNT(*) FILTER (WHERE status = 'failed'), \
              COUNT(*) FILTER (WHERE status = 'waiting' AND scheduled_at > $2) \
             FROM jobs WHERE queue = $1",
        )
        .bind(queue)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count jobs", e))?;

        Ok(JobCounts {
            waiting: row.0,
            active: row.1,
            completed: row.2,
            failed: row.3,
            delayed: row.4,
        })
    }
}
