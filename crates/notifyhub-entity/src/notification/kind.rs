//! Notification kind enumeration.

use serde::{Deserialize, Serialize};

/// Kind of a notification, used for filtering, preference matching, and
/// selecting the payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Platform-level announcements.
    System,
    /// Course lifecycle events (enrollment, new content).
    Course,
    /// Assignment events (posted, due soon, graded).
    Assignment,
    /// Discussion replies and mentions.
    Discussion,
    /// Study-peer matching results.
    PeerMatch,
    /// Badges and milestones.
    Achievement,
    /// User-scheduled reminders.
    Reminder,
    /// Shared-workspace collaboration events.
    Collaboration,
    /// Learning resource events (shared, approved).
    Resource,
    /// XP and leaderboard events.
    Gamification,
    /// AI-generated study recommendations.
    AiRecommendation,
    /// Anything that fits no other kind.
    General,
}

impl NotificationKind {
    /// All kinds, in declaration order.
    pub const ALL: [NotificationKind; 12] = [
        Self::System,
        Self::Course,
        Self::Assignment,
        Self::Discussion,
        Self::PeerMatch,
        Self::Achievement,
        Self::Reminder,
        Self::Collaboration,
        Self::Resource,
        Self::Gamification,
        Self::AiRecommendation,
        Self::General,
    ];

    /// Return the kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Course => "course",
            Self::Assignment => "assignment",
            Self::Discussion => "discussion",
            Self::PeerMatch => "peer_match",
            Self::Achievement => "achievement",
            Self::Reminder => "reminder",
            Self::Collaboration => "collaboration",
            Self::Resource => "resource",
            Self::Gamification => "gamification",
            Self::AiRecommendation => "ai_recommendation",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
