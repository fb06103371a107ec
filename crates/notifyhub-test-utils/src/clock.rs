use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use notifyhub_core::clock::Clock;

/// A clock that only moves when the test tells it to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Pin the clock to an RFC 3339 instant, e.g. `"2026-03-01T12:00:00Z"`.
    ///
    /// # Panics
    /// Panics on an unparseable timestamp; this is test-only code.
    pub fn at(rfc3339: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(rfc3339)
            .expect("valid RFC 3339 timestamp")
            .with_timezone(&Utc);
        Self {
            now: Mutex::new(now),
        }
    }

    /// Pin the clock to a given instant.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock forward.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(secs);
    }

    /// Jump the clock to a new instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap() = instant;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
