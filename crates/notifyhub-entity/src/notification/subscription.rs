//! Push subscription entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered web-push endpoint, one row per device/browser.
///
/// Unsubscribing deactivates the row instead of deleting it so that
/// delivery history stays intact.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PushSubscription {
    /// Unique subscription identifier.
    pub id: Uuid,
    /// The owning user.
    pub user_id: Uuid,
    /// Push service endpoint URL. Unique per (user, endpoint).
    pub endpoint: String,
    /// Client public key (P-256 ECDH).
    pub p256dh_key: String,
    /// Client auth secret.
    pub auth_key: String,
    /// User agent that registered the subscription.
    pub user_agent: Option<String>,
    /// Whether the subscription should receive pushes.
    pub is_active: bool,
    /// Last time a push was attempted on this endpoint.
    pub last_used: Option<DateTime<Utc>>,
    /// When the subscription was first registered.
    pub created_at: DateTime<Utc>,
}
