//! Periodic sweep scheduler.
//!
//! Two independent tickers on one cooperative timeline: a short one for
//! notifications and a slower one for expiry. There is no locking between
//! them: every mutation they perform is idempotent and keyed by row id,
//! so overlapping runs (including a manual force check) are safe.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use tollgate_core::config::SweepConfig;

use crate::expiry::ExpirySweeper;
use crate::notifications::NotificationSweeper;

/// Tick periods for the two sweeps. Tunables, not correctness parameters.
#[derive(Debug, Clone, Copy)]
pub struct SweepIntervals {
    pub notifications: Duration,
    pub expiry: Duration,
}

impl SweepIntervals {
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            notifications: Duration::from_secs(config.notification_interval_secs),
            expiry: Duration::from_secs(config.expiry_interval_secs),
        }
    }
}

impl Default for SweepIntervals {
    fn default() -> Self {
        Self {
            notifications: Duration::from_secs(10),
            expiry: Duration::from_secs(30),
        }
    }
}

/// Drives the two sweepers until shutdown is signaled.
///
/// Shutdown is clean: an in-flight sweep always finishes its row set;
/// only the wait between ticks is interrupted.
pub struct SweepScheduler {
    notifications: Arc<NotificationSweeper>,
    expiry: Arc<ExpirySweeper>,
    intervals: SweepIntervals,
    shutdown: watch::Sender<bool>,
}

impl SweepScheduler {
    pub fn new(
        notifications: Arc<NotificationSweeper>,
        expiry: Arc<ExpirySweeper>,
        intervals: SweepIntervals,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            notifications,
            expiry,
            intervals,
            shutdown,
        }
    }

    /// Signal the scheduler to stop after the current sweep (if any).
    pub fn shutdown(&self) {
        info!("Sweep scheduler shutdown requested");
        // send_replace so the signal sticks even before run() subscribes.
        self.shutdown.send_replace(true);
    }

    /// Run both sweeps once, out-of-band. Safe to call while the periodic
    /// loop is running.
    pub async fn force_check(&self) {
        info!("Manual check triggered");
        let notifications = self.notifications.sweep().await;
        let expiry = self.expiry.sweep().await;
        info!(
            sent = notifications.sent,
            expired = expiry.expired,
            "Manual check complete"
        );
    }

    /// Main loop. Returns once shutdown has been signaled.
    pub async fn run(&self) {
        let mut shutdown_rx = self.shutdown.subscribe();
        if *shutdown_rx.borrow() {
            return;
        }

        let mut notification_tick = interval_at(
            Instant::now() + self.intervals.notifications,
            self.intervals.notifications,
        );
        notification_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut expiry_tick = interval_at(
            Instant::now() + self.intervals.expiry,
            self.intervals.expiry,
        );
        expiry_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            notifications_secs = self.intervals.notifications.as_secs(),
            expiry_secs = self.intervals.expiry.as_secs(),
            "Sweep scheduler started"
        );

        loop {
            tokio::select! {
                _ = notification_tick.tick() => {
                    let report = self.notifications.sweep().await;
                    if report.due > 0 {
                        debug!(
                            due = report.due,
                            sent = report.sent,
                            failed = report.failed,
                            "Notification sweep complete"
                        );
                    }
                }
                _ = expiry_tick.tick() => {
                    let report = self.expiry.sweep().await;
                    if report.expired > 0 || report.revoke_failed > 0 {
                        debug!(
                            expired = report.expired,
                            revoke_failed = report.revoke_failed,
                            "Expiry sweep complete"
                        );
                    }
                }
                _ = shutdown_rx.changed() => {
                    break;
                }
            }
        }

        info!("Sweep scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_clock, MockGateway, MockNotifier};
    use chrono::Duration as ChronoDuration;
    use tollgate_core::{GrantDuration, SubscriberId, SubscriberStatus};
    use tollgate_notify::MessageCatalog;
    use tollgate_store::{GrantRequest, Store};

    struct Fixture {
        scheduler: SweepScheduler,
        store: Arc<Store>,
        notifier: Arc<MockNotifier>,
        gateway: Arc<MockGateway>,
        clock: Arc<tollgate_core::ManualClock>,
    }

    fn fixture(intervals: SweepIntervals) -> Fixture {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        let notifier = Arc::new(MockNotifier::succeeding());
        let gateway = Arc::new(MockGateway::succeeding());

        let notifications = Arc::new(NotificationSweeper::new(
            store.clone(),
            notifier.clone(),
            MessageCatalog::new(),
            clock.clone(),
        ));
        let expiry = Arc::new(ExpirySweeper::new(
            store.clone(),
            gateway.clone(),
            notifier.clone(),
            MessageCatalog::new(),
            clock.clone(),
        ));

        Fixture {
            scheduler: SweepScheduler::new(notifications, expiry, intervals),
            store,
            notifier,
            gateway,
            clock,
        }
    }

    fn request(id: i64, duration: GrantDuration) -> GrantRequest {
        GrantRequest {
            id: SubscriberId(id),
            username: None,
            first_name: None,
            last_name: None,
            duration,
            actor: None,
        }
    }

    #[tokio::test]
    async fn shutdown_before_run_returns_immediately() {
        let fx = fixture(SweepIntervals::default());
        fx.scheduler.shutdown();
        tokio::time::timeout(Duration::from_millis(100), fx.scheduler.run())
            .await
            .expect("run should return once shutdown is signaled");
    }

    #[tokio::test]
    async fn periodic_loop_sweeps_and_stops_cleanly() {
        let fx = fixture(SweepIntervals {
            notifications: Duration::from_millis(10),
            expiry: Duration::from_millis(15),
        });
        fx.store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;
        fx.clock.advance(ChronoDuration::minutes(4));

        let scheduler = Arc::new(fx.scheduler);
        let runner = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run().await })
        };

        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.shutdown();
        tokio::time::timeout(Duration::from_millis(200), runner)
            .await
            .expect("scheduler should stop after shutdown")
            .unwrap();

        // The expiry sweep revoked and notified; each exactly once.
        assert_eq!(fx.gateway.revoke_count(), 1);
        let sub = fx.store.get(SubscriberId(42)).await.unwrap();
        assert_eq!(sub.status, SubscriberStatus::Expired);
    }

    #[tokio::test]
    async fn force_check_runs_both_sweeps() {
        let fx = fixture(SweepIntervals::default());
        fx.store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;
        fx.clock.advance(ChronoDuration::minutes(4));

        fx.scheduler.force_check().await;

        assert_eq!(fx.gateway.revoke_count(), 1);
        let sub = fx.store.get(SubscriberId(42)).await.unwrap();
        assert_eq!(sub.status, SubscriberStatus::Expired);
    }

    #[tokio::test]
    async fn repeated_force_checks_send_at_most_once() {
        let fx = fixture(SweepIntervals::default());
        fx.store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;
        fx.clock.advance(ChronoDuration::minutes(2));

        fx.scheduler.force_check().await;
        let sent_after_first = fx.notifier.sent_count();
        fx.scheduler.force_check().await;

        assert_eq!(fx.notifier.sent_count(), sent_after_first);
    }
}
