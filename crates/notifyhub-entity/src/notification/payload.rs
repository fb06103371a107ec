//! Structured notification payloads.
//!
//! The `data` column is a tagged union keyed by payload shape rather than a
//! free-form JSON blob, so processors and clients can deserialize it without
//! guessing. `Generic` is the escape hatch for payloads with no dedicated
//! shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type-specific structured payload attached to a notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum NotificationData {
    /// Course lifecycle payload.
    Course {
        /// The course involved.
        course_id: Uuid,
        /// Display name of the course.
        course_name: String,
    },
    /// Assignment payload.
    Assignment {
        /// The assignment involved.
        assignment_id: Uuid,
        /// Owning course.
        course_id: Uuid,
        /// Due date, when relevant.
        due_at: Option<DateTime<Utc>>,
    },
    /// Discussion reply/mention payload.
    Discussion {
        /// Thread the activity happened in.
        thread_id: Uuid,
        /// Display name of the author who triggered it.
        author_name: String,
    },
    /// Peer-match payload.
    PeerMatch {
        /// The match record.
        match_id: Uuid,
        /// The matched peer.
        peer_id: Uuid,
        /// Match score in [0, 1].
        score: f64,
    },
    /// Achievement payload.
    Achievement {
        /// Badge identifier.
        badge: String,
        /// XP awarded with the badge, if any.
        xp: Option<i64>,
    },
    /// Digest email payload: unread counts grouped by kind.
    Digest {
        /// Map of kind name to unread count in the digest window.
        counts: std::collections::HashMap<String, usize>,
    },
    /// Opaque payload for kinds with no dedicated shape.
    Generic {
        /// Arbitrary JSON supplied by the producer.
        payload: serde_json::Value,
    },
}
