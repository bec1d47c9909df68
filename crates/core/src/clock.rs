//! The single source of "now" for the whole engine.
//!
//! Store, ledger, and sweeper logic never touch the system clock directly;
//! they all go through a [`Clock`] so every comparison happens on one
//! timeline and tests can drive time by hand.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

/// Display format for expiry timestamps shown to subscribers
/// (12-hour clock in the reference timezone).
const DISPLAY_FORMAT: &str = "%Y-%m-%d %I:%M %p";

/// Time provider with a fixed reference timezone.
///
/// All stored timestamps are UTC; the timezone only matters for rendering
/// dates back to people.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The reference timezone used for display.
    fn timezone(&self) -> Tz;

    /// Format a timestamp for user-facing messages.
    fn format_local(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.timezone())
            .format(DISPLAY_FORMAT)
            .to_string()
    }
}

/// Wall-clock implementation.
#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Hand-driven clock for tests and deterministic replay.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    tz: Tz,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            now: RwLock::new(start),
            tz,
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().expect("clock lock poisoned")
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}
