//! Subscription lifecycle engine: the two periodic sweeps, the sweep
//! scheduler that drives them, and the grant/extend/remove lifecycle
//! service that keeps the access gateway in step with the store.

pub mod expiry;
pub mod lifecycle;
pub mod notifications;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use expiry::{ExpirySweepReport, ExpirySweeper};
pub use lifecycle::Lifecycle;
pub use notifications::{NotificationSweepReport, NotificationSweeper};
pub use scheduler::{SweepIntervals, SweepScheduler};
