//! In-memory stores, mock transports, and a controllable clock for tests.
//!
//! Everything here implements the same traits the Postgres repositories and
//! network clients do, so pipeline logic can be exercised without a database
//! or a network.

mod clock;
mod stores;
mod transports;

pub use clock::FixedClock;
pub use stores::{
    MemoryJobStore, MemoryNotificationStore, MemoryPreferenceStore, MemorySubscriptionStore,
    MemoryUserStore,
};
pub use transports::{MockEmailTransport, MockPushFailure, MockPushTransport};
