//! # notifyhub-database
//!
//! Persistence layer for NotifyHub: the store traits every other crate
//! programs against, PostgreSQL pool management, migrations, and the
//! Postgres repository implementations.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod stores;

pub use stores::{
    JobCounts, JobStore, NotificationStore, PreferenceStore, StatusCount, SubscriptionStore,
    UserStore,
};
