//! User entity model.
//!
//! The pipeline only reads users; account management lives elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A platform user, as far as the notification pipeline needs to know.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: Uuid,
    /// Email address used for the email channel.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
