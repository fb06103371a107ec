//! Queue and retry-policy configuration.
//!
//! Backoff is an explicit configuration value per job type rather than a
//! framework default, so it can be tested in isolation.

use serde::{Deserialize, Serialize};

/// Retry policy for one job type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of execution attempts (1 = no retry).
    pub max_attempts: i32,
    /// Base delay for exponential backoff, in seconds.
    ///
    /// Attempt `n` (1-based) that fails transiently is rescheduled after
    /// `backoff_base_secs * 2^(n-1)` seconds.
    pub backoff_base_secs: u64,
}

impl RetryPolicy {
    /// Delay before the next attempt, given how many attempts have run.
    pub fn backoff_delay_secs(&self, attempts_made: i32) -> u64 {
        let exp = attempts_made.saturating_sub(1).clamp(0, 16) as u32;
        self.backoff_base_secs.saturating_mul(1u64 << exp)
    }

    /// Whether another attempt is allowed after `attempts_made` runs.
    pub fn can_retry(&self, attempts_made: i32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Concurrency and retry settings for one job type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JobTypeConfig {
    /// Maximum jobs of this type processed concurrently.
    pub concurrency: usize,
    /// Retry policy applied by the owning queue.
    pub retry: RetryPolicy,
}

/// Per-job-type settings for the three queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuesConfig {
    /// `push-fanout` on the notification-dispatch queue.
    #[serde(default = "default_push_fanout")]
    pub push_fanout: JobTypeConfig,
    /// `batch-ingest` on the notification-dispatch queue.
    #[serde(default = "default_batch_ingest")]
    pub batch_ingest: JobTypeConfig,
    /// `digest-build` on the notification-dispatch queue.
    #[serde(default = "default_digest_build")]
    pub digest_build: JobTypeConfig,
    /// `send-email` on the email-dispatch queue.
    #[serde(default = "default_send_email")]
    pub send_email: JobTypeConfig,
    /// `sweep-archived` on the cleanup queue.
    #[serde(default = "default_sweep_archived")]
    pub sweep_archived: JobTypeConfig,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            push_fanout: default_push_fanout(),
            batch_ingest: default_batch_ingest(),
            digest_build: default_digest_build(),
            send_email: default_send_email(),
            sweep_archived: default_sweep_archived(),
        }
    }
}

fn default_push_fanout() -> JobTypeConfig {
    JobTypeConfig {
        concurrency: 5,
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base_secs: 2,
        },
    }
}

fn default_batch_ingest() -> JobTypeConfig {
    JobTypeConfig {
        concurrency: 3,
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base_secs: 2,
        },
    }
}

fn default_digest_build() -> JobTypeConfig {
    JobTypeConfig {
        concurrency: 1,
        retry: RetryPolicy {
            max_attempts: 3,
            backoff_base_secs: 2,
        },
    }
}

fn default_send_email() -> JobTypeConfig {
    JobTypeConfig {
        concurrency: 10,
        retry: RetryPolicy {
            max_attempts: 5,
            backoff_base_secs: 5,
        },
    }
}

fn default_sweep_archived() -> JobTypeConfig {
    JobTypeConfig {
        concurrency: 1,
        retry: RetryPolicy {
            max_attempts: 1,
            backoff_base_secs: 0,
        },
    }
}
