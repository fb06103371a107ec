//! Worker runner — polls queues for eligible jobs and executes them.
//!
//! One runner serves all queues. Each (queue, job type) pair is a lane
//! with its own semaphore, so slow fan-outs cannot starve batch ingestion
//! and the configured per-job-type concurrency bounds hold globally for
//! this process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::time;

use notifyhub_core::config::WorkerConfig;
use notifyhub_queue::JobQueue;

use crate::executor::{JobExecutionError, JobExecutor};

/// One (queue, job type) polling lane with its concurrency bound.
#[derive(Clone)]
pub struct Lane {
    queue: String,
    job_type: String,
    slots: Arc<Semaphore>,
    concurrency: usize,
}

impl Lane {
    /// Create a lane with the given concurrency bound.
    pub fn new(queue: impl Into<String>, job_type: impl Into<String>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            queue: queue.into(),
            job_type: job_type.into(),
            slots: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }
}

/// Polls all lanes and executes claimed jobs until cancelled.
pub struct WorkerRunner {
    queue: JobQueue,
    executor: Arc<JobExecutor>,
    config: WorkerConfig,
    worker_id: String,
    lanes: Vec<Lane>,
}

impl WorkerRunner {
    /// Create a new worker runner.
    pub fn new(
        queue: JobQueue,
        executor: Arc<JobExecutor>,
        config: WorkerConfig,
        worker_id: impl Into<String>,
        lanes: Vec<Lane>,
    ) -> Self {
        Self {
            queue,
            executor,
            config,
            worker_id: worker_id.into(),
            lanes,
        }
    }

    /// Run until the cancel signal flips true, then drain in-flight jobs.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            worker_id = %self.worker_id,
            lanes = self.lanes.len(),
            poll_interval_ms = self.config.poll_interval_ms,
            "Worker started"
        );

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            if *cancel.borrow() {
                break;
            }
            self.poll_once().await;
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        tracing::info!(worker_id = %self.worker_id, "Worker received shutdown signal");
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {}
            }
        }

        self.drain().await;
        tracing::info!(worker_id = %self.worker_id, "Worker shut down");
    }

    /// One pass over all lanes, claiming as many eligible jobs as free
    /// slots allow.
    async fn poll_once(&self) {
        for lane in &self.lanes {
            loop {
                let permit = match lane.slots.clone().try_acquire_owned() {
                    Ok(p) => p,
                    Err(_) => break,
                };

                match self
                    .queue
                    .claim(&lane.queue, &lane.job_type, &self.worker_id)
                    .await
                {
                    Ok(Some(job)) => {
                        let queue = self.queue.clone();
                        let executor = Arc::clone(&self.executor);
                        tokio::spawn(async move {
                            let _permit = permit;
                            process_job(&queue, &executor, job).await;
                        });
                    }
                    Ok(None) => {
                        drop(permit);
                        break;
                    }
                    Err(e) => {
                        drop(permit);
                        tracing::error!(
                            queue = %lane.queue,
                            job_type = %lane.job_type,
                            error = %e,
                            "Failed to claim job"
                        );
                        break;
                    }
                }
            }
        }
    }

    /// Wait for in-flight jobs, bounded by the drain timeout.
    async fn drain(&self) {
        tracing::info!(worker_id = %self.worker_id, "Waiting for in-flight jobs");
        let timeout = Duration::from_secs(self.config.drain_timeout_seconds);
        for lane in &self.lanes {
            let _ = time::timeout(timeout, lane.slots.acquire_many(lane.concurrency as u32)).await;
        }
    }
}

async fn process_job(
    queue: &JobQueue,
    executor: &JobExecutor,
    job: notifyhub_entity::job::model::Job,
) {
    let job_id = job.id;
    match executor.execute(&job).await {
        Ok(result) => {
            if let Err(e) = queue.complete(job_id, result).await {
                tracing::error!(%job_id, error = %e, "Failed to mark job completed");
            } else {
                tracing::info!(%job_id, "Job completed");
            }
        }
        Err(JobExecutionError::Transient(msg)) => {
            retry_or_fail(queue, &job, &msg).await;
        }
        Err(JobExecutionError::Internal(err)) => {
            retry_or_fail(queue, &job, &err.to_string()).await;
        }
        Err(JobExecutionError::Permanent(msg)) => {
            tracing::error!(%job_id, error = %msg, "Job failed permanently");
            if let Err(e) = queue.fail(job_id, &msg).await {
                tracing::error!(%job_id, error = %e, "Failed to mark job failed");
            }
        }
    }
}

async fn retry_or_fail(queue: &JobQueue, job: &notifyhub_entity::job::model::Job, msg: &str) {
    let job_id = job.id;
    if job.can_retry() {
        tracing::warn!(%job_id, error = %msg, "Job failed, scheduling retry");
        if let Err(e) = queue.retry_later(job, msg).await {
            tracing::error!(%job_id, error = %e, "Failed to reschedule job");
        }
    } else {
        tracing::error!(%job_id, error = %msg, "Job failed, attempts exhausted");
        if let Err(e) = queue.fail(job_id, msg).await {
            tracing::error!(%job_id, error = %e, "Failed to mark job failed");
        }
    }
}
