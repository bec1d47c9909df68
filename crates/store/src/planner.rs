//! Interval planner: maps a granted duration to the reminder offsets that
//! should fire before expiry.

use chrono::{DateTime, Duration, Utc};

use tollgate_core::ReminderKind;

/// Day-offset bucket for grants of one day or longer.
const DAY_BUCKET: &[u32] = &[7, 3, 1, 0];
/// Minute-offset bucket for grants of one hour up to one day.
const HOUR_BUCKET: &[u32] = &[60, 30, 10, 0];
/// Minute-offset bucket for grants under one hour.
const SHORT_BUCKET: &[u32] = &[10, 5, 2, 1, 0];

/// A reminder the planner wants inserted into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedReminder {
    pub kind: ReminderKind,
    pub due_at: DateTime<Utc>,
}

/// Select the offset bucket for a total granted duration.
///
/// Buckets are keyed by the whole window (original grant through the
/// latest `valid_until`), so an extension that crosses a boundary replans
/// into the coarser bucket.
fn bucket_for(total: Duration) -> (&'static [u32], bool) {
    let total_minutes = total.num_minutes();
    if total_minutes >= 1440 {
        (DAY_BUCKET, true)
    } else if total_minutes >= 60 {
        (HOUR_BUCKET, false)
    } else {
        (SHORT_BUCKET, false)
    }
}

/// Compute the reminder set for a validity window.
///
/// Every entry satisfies `due_at > now`: offsets that already elapsed are
/// dropped, never back-filled or sent immediately. A fixed entry at
/// `valid_until - 5s` is always attempted regardless of bucket so even the
/// shortest grant gets a last-moment notification.
pub fn plan_reminders(
    now: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    total: Duration,
) -> Vec<PlannedReminder> {
    let mut planned = Vec::new();

    let countdown_at = valid_until - Duration::seconds(5);
    if countdown_at > now {
        planned.push(PlannedReminder {
            kind: ReminderKind::FinalCountdown,
            due_at: countdown_at,
        });
    }

    let (offsets, in_days) = bucket_for(total);
    for &offset in offsets {
        let (kind, due_at) = if in_days {
            (
                ReminderKind::Days(offset),
                valid_until - Duration::days(i64::from(offset)),
            )
        } else {
            (
                ReminderKind::Minutes(offset),
                valid_until - Duration::minutes(i64::from(offset)),
            )
        };
        if due_at > now {
            planned.push(PlannedReminder { kind, due_at });
        }
    }

    planned
}
