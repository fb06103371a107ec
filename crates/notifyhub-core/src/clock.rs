//! Clock abstraction.
//!
//! The service and the workers never call `Utc::now()` directly; they take
//! a [`Clock`] at construction so that quiet-hours, digest-window, and
//! retention logic can be tested against a fixed point in time.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
