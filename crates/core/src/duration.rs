//! Grant durations expressed the way operators enter them.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// A granted duration in operator units (days/hours/minutes).
///
/// Kept as entered so audit details and bucket selection can both work
/// from the same value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDuration {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl GrantDuration {
    pub fn new(days: u32, hours: u32, minutes: u32) -> Self {
        Self { days, hours, minutes }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(days, 0, 0)
    }

    pub fn from_minutes(minutes: u32) -> Self {
        Self::new(0, 0, minutes)
    }

    /// Total length in minutes; the planner's bucket selector.
    pub fn total_minutes(&self) -> i64 {
        i64::from(self.days) * 1440 + i64::from(self.hours) * 60 + i64::from(self.minutes)
    }

    pub fn is_zero(&self) -> bool {
        self.total_minutes() == 0
    }

    pub fn to_chrono(&self) -> Duration {
        Duration::minutes(self.total_minutes())
    }
}

impl fmt::Display for GrantDuration {
    /// Audit-detail wording: "3 days, 2 hours, and 5 minutes".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} days, {} hours, and {} minutes",
            self.days, self.hours, self.minutes
        )
    }
}
