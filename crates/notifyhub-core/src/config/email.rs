//! SMTP email transport configuration.

use serde::{Deserialize, Serialize};

/// SMTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host.
    #[serde(default = "default_host")]
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// SMTP username (empty = unauthenticated, e.g. Mailpit in development).
    #[serde(default)]
    pub username: String,
    /// SMTP password.
    #[serde(default)]
    pub password: String,
    /// Whether to use TLS via the relay.
    #[serde(default)]
    pub use_tls: bool,
    /// From address for outgoing mail.
    #[serde(default = "default_from")]
    pub from_address: String,
    /// Display name for outgoing mail.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            use_tls: false,
            from_address: default_from(),
            from_name: default_from_name(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1025
}

fn default_from() -> String {
    "noreply@localhost".to_string()
}

fn default_from_name() -> String {
    "NotifyHub".to_string()
}
