pub mod clock;
pub mod config;
pub mod duration;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use duration::GrantDuration;
pub use types::{
    AuditAction, AuditEntry, DueReminder, ReminderEntry, ReminderKind, Subscriber, SubscriberId,
    SubscriberStatus,
};
