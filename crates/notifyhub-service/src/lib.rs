//! The producer-facing notification service.
//!
//! Everything that creates, queries, or mutates notifications goes through
//! [`NotificationService`]; the workers only ever see what it enqueued.

pub mod notification;

pub use notification::service::{
    BatchReceipt, CreateNotification, CreateOutcome, NotificationService, NotificationStats,
    SubscribePush,
};
