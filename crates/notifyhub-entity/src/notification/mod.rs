//! Notification domain entities.

pub mod kind;
pub mod model;
pub mod payload;
pub mod preference;
pub mod priority;
pub mod query;
pub mod status;
pub mod subscription;

pub use kind::NotificationKind;
pub use model::{Notification, NotificationDraft};
pub use payload::NotificationData;
pub use preference::{DigestFrequency, NotificationPreference};
pub use priority::NotificationPriority;
pub use query::NotificationQuery;
pub use status::NotificationStatus;
pub use subscription::PushSubscription;
