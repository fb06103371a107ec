//! Typed payloads exchanged between the service and the job processors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::model::NotificationDraft;

/// Payload of a `push-fanout` job: deliver one group of notifications to all
/// active subscriptions of one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFanoutPayload {
    /// The recipient user.
    pub user_id: Uuid,
    /// Group key shared by the notifications to mark delivered.
    pub group_key: String,
}

/// Payload of a `batch-ingest` job: persist surviving drafts and fan out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchIngestPayload {
    /// Identifier of the batch submission.
    pub batch_id: Uuid,
    /// Group key stamped on every notification in the batch.
    pub group_key: String,
    /// The drafts to re-validate and persist.
    pub drafts: Vec<NotificationDraft>,
}

/// Payload of a `send-email` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailPayload {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Template name understood by the mailer.
    pub template: String,
    /// Template data.
    pub data: serde_json::Value,
}

/// Payload of a `digest-build` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestBuildPayload {
    /// The user whose digest to build.
    pub user_id: Uuid,
    /// The chain this build belongs to. Must still match the user's
    /// stored `digest_chain_id` when the job runs.
    pub chain_id: Uuid,
}

/// Payload of a `sweep-archived` job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepArchivedPayload {
    /// Archived rows older than this many days are deleted.
    pub max_age_days: i64,
}
