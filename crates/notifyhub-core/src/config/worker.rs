//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Worker poll-loop configuration shared by all queue runners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the workers are enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Interval in milliseconds between job queue polls when idle.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Seconds to wait for in-flight jobs during shutdown.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval(),
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    500
}

fn default_drain_timeout() -> u64 {
    30
}
