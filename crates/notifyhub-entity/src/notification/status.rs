//! Notification status enumeration and transition rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a notification.
///
/// Transitions are monotonic: a notification never leaves `Archived` or
/// `Dismissed`, and never returns to `Unread`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    /// Delivered in-app but not yet read.
    Unread,
    /// Read by the owner.
    Read,
    /// Archived by the owner; eligible for the retention sweep.
    Archived,
    /// Dismissed by the client; terminal, never swept automatically.
    Dismissed,
}

impl NotificationStatus {
    /// Check if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived | Self::Dismissed)
    }

    /// Check whether a transition to `next` is allowed.
    pub fn can_transition(&self, next: NotificationStatus) -> bool {
        match self {
            Self::Unread => matches!(next, Self::Read | Self::Archived | Self::Dismissed),
            Self::Read => matches!(next, Self::Archived | Self::Dismissed),
            Self::Archived | Self::Dismissed => false,
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
            Self::Archived => "archived",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archived_is_terminal() {
        assert!(!NotificationStatus::Archived.can_transition(NotificationStatus::Unread));
        assert!(!NotificationStatus::Archived.can_transition(NotificationStatus::Read));
        assert!(NotificationStatus::Archived.is_terminal());
    }

    #[test]
    fn test_read_never_reverts() {
        assert!(!NotificationStatus::Read.can_transition(NotificationStatus::Unread));
        assert!(NotificationStatus::Read.can_transition(NotificationStatus::Archived));
    }
}
