//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod database;
pub mod email;
pub mod logging;
pub mod push;
pub mod queue;
pub mod retention;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::database::DatabaseConfig;
pub use self::email::EmailConfig;
pub use self::logging::LoggingConfig;
pub use self::push::PushConfig;
pub use self::queue::{JobTypeConfig, QueuesConfig, RetryPolicy};
pub use self::retention::RetentionConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// (default.toml + environment overlay + `NOTIFYHUB__` env vars).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Worker poll-loop settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Per-queue, per-job-type concurrency and retry policies.
    #[serde(default)]
    pub queues: QueuesConfig,
    /// Web push transport settings.
    #[serde(default)]
    pub push: PushConfig,
    /// SMTP email transport settings.
    #[serde(default)]
    pub email: EmailConfig,
    /// Notification retention settings.
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `NOTIFYHUB__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NOTIFYHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
