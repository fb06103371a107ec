//! Notification retention configuration.

use serde::{Deserialize, Serialize};

/// Retention settings for the archived-notification sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Archived notifications older than this many days are deleted.
    #[serde(default = "default_max_age_days")]
    pub archived_max_age_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            archived_max_age_days: default_max_age_days(),
        }
    }
}

fn default_max_age_days() -> i64 {
    30
}
