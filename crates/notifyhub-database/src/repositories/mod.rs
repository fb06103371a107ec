//! Postgres repository implementations of the store traits.

pub mod job;
pub mod notification;
pub mod preference;
pub mod subscription;
pub mod user;

pub use job::JobRepository;
pub use notification::NotificationRepository;
pub use preference::PreferenceRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;
