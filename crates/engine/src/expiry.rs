//! Expiry sweep: revoke access from subscribers past their window.

use std::sync::Arc;

use tracing::{info, warn};

use tollgate_core::{Clock, SubscriberStatus};
use tollgate_notify::{AccessGateway, MessageCatalog, Notifier};
use tollgate_store::Store;

/// Outcome counters for one expiry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpirySweepReport {
    pub checked: usize,
    pub expired: usize,
    pub revoke_failed: usize,
}

/// Flips overdue subscribers to expired, but only after the gateway
/// confirmed the revocation.
///
/// The ordering is the invariant: status never says expired while the
/// gateway still grants access. A failed revoke leaves the row active
/// and the next sweep tries again.
pub struct ExpirySweeper {
    store: Arc<Store>,
    gateway: Arc<dyn AccessGateway>,
    notifier: Arc<dyn Notifier>,
    catalog: MessageCatalog,
    clock: Arc<dyn Clock>,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<Store>,
        gateway: Arc<dyn AccessGateway>,
        notifier: Arc<dyn Notifier>,
        catalog: MessageCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            catalog,
            clock,
        }
    }

    pub async fn sweep(&self) -> ExpirySweepReport {
        let now = self.clock.now();
        let active = self.store.list(Some(SubscriberStatus::Active)).await;
        let mut report = ExpirySweepReport {
            checked: active.len(),
            ..Default::default()
        };

        for subscriber in active {
            if subscriber.valid_until > now {
                continue;
            }

            match self.gateway.revoke(subscriber.id).await {
                Ok(()) => {
                    self.store
                        .set_status(subscriber.id, SubscriberStatus::Expired)
                        .await;
                    report.expired += 1;
                    info!(subscriber = %subscriber.id, "Subscription expired, access revoked");

                    let message = self.catalog.expired_kick_message();
                    if let Err(e) = self.notifier.send(subscriber.id, &message).await {
                        // Status already flipped; the notice is best-effort.
                        warn!(subscriber = %subscriber.id, error = %e, "Failed to send expiry notice");
                    }
                }
                Err(e) => {
                    // Row stays active; retried on the next sweep.
                    report.revoke_failed += 1;
                    warn!(subscriber = %subscriber.id, error = %e, "Failed to revoke access");
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_clock, MockGateway, MockNotifier};
    use chrono::Duration;
    use tollgate_core::{GrantDuration, SubscriberId};
    use tollgate_store::GrantRequest;

    fn request(id: i64, duration: GrantDuration) -> GrantRequest {
        GrantRequest {
            id: SubscriberId(id),
            username: None,
            first_name: Some("Test".to_string()),
            last_name: None,
            duration,
            actor: None,
        }
    }

    fn sweeper(
        store: &Arc<Store>,
        gateway: &Arc<MockGateway>,
        notifier: &Arc<MockNotifier>,
        clock: &Arc<tollgate_core::ManualClock>,
    ) -> ExpirySweeper {
        ExpirySweeper::new(
            store.clone(),
            gateway.clone() as Arc<dyn AccessGateway>,
            notifier.clone() as Arc<dyn Notifier>,
            MessageCatalog::new(),
            clock.clone(),
        )
    }

    #[tokio::test]
    async fn expires_overdue_subscriber_on_revoke_success() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let gateway = Arc::new(MockGateway::succeeding());
        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = sweeper(&store, &gateway, &notifier, &clock);

        clock.advance(Duration::minutes(4));
        let report = sweeper.sweep().await;

        assert_eq!(report.expired, 1);
        assert_eq!(gateway.revoke_count(), 1);
        let sub = store.get(SubscriberId(42)).await.unwrap();
        assert_eq!(sub.status, SubscriberStatus::Expired);
        // The kicked notice went out after the flip.
        assert_eq!(notifier.sent_count(), 1);
    }

    #[tokio::test]
    async fn revoke_failure_leaves_subscriber_active() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let gateway = Arc::new(MockGateway::failing());
        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = sweeper(&store, &gateway, &notifier, &clock);

        clock.advance(Duration::minutes(4));
        let report = sweeper.sweep().await;

        assert_eq!(report.expired, 0);
        assert_eq!(report.revoke_failed, 1);
        let sub = store.get(SubscriberId(42)).await.unwrap();
        assert_eq!(sub.status, SubscriberStatus::Active);
        assert_eq!(notifier.sent_count(), 0);

        // Gateway recovers: the next sweep finishes the job.
        gateway.set_failing(false);
        let report = sweeper.sweep().await;
        assert_eq!(report.expired, 1);
        let sub = store.get(SubscriberId(42)).await.unwrap();
        assert_eq!(sub.status, SubscriberStatus::Expired);
    }

    #[tokio::test]
    async fn future_windows_are_untouched() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store.grant(&request(42, GrantDuration::from_days(1))).await;

        let gateway = Arc::new(MockGateway::succeeding());
        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = sweeper(&store, &gateway, &notifier, &clock);

        let report = sweeper.sweep().await;
        assert_eq!(report.checked, 1);
        assert_eq!(report.expired, 0);
        assert_eq!(gateway.revoke_count(), 0);
    }

    #[tokio::test]
    async fn sweep_is_idempotent_for_expired_rows() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let gateway = Arc::new(MockGateway::succeeding());
        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = sweeper(&store, &gateway, &notifier, &clock);

        clock.advance(Duration::minutes(4));
        sweeper.sweep().await;
        let report = sweeper.sweep().await;

        // Already expired, so no longer in the active set.
        assert_eq!(report.checked, 0);
        assert_eq!(gateway.revoke_count(), 1);
        assert_eq!(notifier.sent_count(), 1);
    }
}
