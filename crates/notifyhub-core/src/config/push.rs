//! Web push transport configuration.

use serde::{Deserialize, Serialize};

/// Web push transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Push message TTL in seconds.
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// Maximum subscriptions contacted concurrently during fan-out.
    #[serde(default = "default_fanout_concurrency")]
    pub fanout_concurrency: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            request_timeout_seconds: default_timeout(),
            fanout_concurrency: default_fanout_concurrency(),
        }
    }
}

fn default_ttl() -> u32 {
    3600
}

fn default_timeout() -> u64 {
    10
}

fn default_fanout_concurrency() -> usize {
    8
}
