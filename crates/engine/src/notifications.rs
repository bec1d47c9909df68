//! Notification sweep: deliver due reminders and mark them sent.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tollgate_core::Clock;
use tollgate_notify::messages::MessageContext;
use tollgate_notify::{MessageCatalog, Notifier};
use tollgate_store::Store;

/// Outcome counters for one notification sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSweepReport {
    pub due: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Finds due, unsent ledger entries and delivers them.
///
/// An entry is marked sent only after its delivery succeeded; failed
/// sends stay unsent and are retried on the next sweep, so delivery is
/// at-least-once with the sweep interval bounding retry latency.
pub struct NotificationSweeper {
    store: Arc<Store>,
    notifier: Arc<dyn Notifier>,
    catalog: MessageCatalog,
    clock: Arc<dyn Clock>,
}

impl NotificationSweeper {
    pub fn new(
        store: Arc<Store>,
        notifier: Arc<dyn Notifier>,
        catalog: MessageCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            notifier,
            catalog,
            clock,
        }
    }

    pub async fn sweep(&self) -> NotificationSweepReport {
        let due = self.store.due_reminders().await;
        let mut report = NotificationSweepReport {
            due: due.len(),
            ..Default::default()
        };

        for reminder in due {
            let Some(template) = self.catalog.resolve(&reminder.kind) else {
                debug!(
                    subscriber = %reminder.subscriber_id,
                    kind = %reminder.kind,
                    "No template for reminder kind — skipping"
                );
                report.skipped += 1;
                continue;
            };

            let ctx = MessageContext {
                expiry_date: self.clock.format_local(reminder.valid_until),
            };
            let text = match self.catalog.render(template, &ctx) {
                Ok(text) => text,
                Err(e) => {
                    warn!(kind = %reminder.kind, error = %e, "Failed to render reminder");
                    report.failed += 1;
                    continue;
                }
            };

            match self.notifier.send(reminder.subscriber_id, &text).await {
                Ok(()) => {
                    self.store.mark_sent(reminder.id).await;
                    info!(
                        subscriber = %reminder.subscriber_id,
                        kind = %reminder.kind,
                        "Reminder sent"
                    );
                    report.sent += 1;
                }
                Err(e) => {
                    // Left unsent; the next sweep retries it.
                    warn!(
                        subscriber = %reminder.subscriber_id,
                        kind = %reminder.kind,
                        error = %e,
                        "Reminder delivery failed"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_clock, MockNotifier};
    use chrono::Duration;
    use tollgate_core::{GrantDuration, SubscriberId};
    use tollgate_store::GrantRequest;

    fn request(id: i64, duration: GrantDuration) -> GrantRequest {
        GrantRequest {
            id: SubscriberId(id),
            username: Some("user".to_string()),
            first_name: Some("Test".to_string()),
            last_name: None,
            duration,
            actor: None,
        }
    }

    #[tokio::test]
    async fn sends_due_reminders_once() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = NotificationSweeper::new(
            store.clone(),
            notifier.clone(),
            MessageCatalog::new(),
            clock.clone(),
        );

        clock.advance(Duration::minutes(2));
        let report = sweeper.sweep().await;
        assert_eq!(report.due, 2); // 2_minutes and 1_minutes
        assert_eq!(report.sent, 2);
        assert_eq!(notifier.sent_count(), 2);

        // No clock advance: the second sweep is a no-op.
        let report = sweeper.sweep().await;
        assert_eq!(report.due, 0);
        assert_eq!(notifier.sent_count(), 2);
    }

    #[tokio::test]
    async fn failed_delivery_stays_unsent_and_retries() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let notifier = Arc::new(MockNotifier::failing());
        let sweeper = NotificationSweeper::new(
            store.clone(),
            notifier.clone(),
            MessageCatalog::new(),
            clock.clone(),
        );

        clock.advance(Duration::minutes(2));
        let report = sweeper.sweep().await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.sent, 0);

        // Deliveries recover: the same entries go out on the next tick.
        notifier.set_failing(false);
        let report = sweeper.sweep().await;
        assert_eq!(report.due, 2);
        assert_eq!(report.sent, 2);
    }

    #[tokio::test]
    async fn renders_expiry_in_reference_timezone() {
        let (clock, t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = NotificationSweeper::new(
            store.clone(),
            notifier.clone(),
            MessageCatalog::new(),
            clock.clone(),
        );

        clock.advance(Duration::minutes(2));
        sweeper.sweep().await;

        let expected = clock.format_local(t0 + Duration::minutes(3));
        let messages = notifier.messages();
        assert!(messages.iter().any(|(_, text)| text.contains(&expected)));
    }

    #[tokio::test]
    async fn final_countdown_fires_near_expiry() {
        let (clock, _t0) = test_clock();
        let store = Arc::new(Store::in_memory(clock.clone()));
        store
            .grant(&request(42, GrantDuration::from_minutes(3)))
            .await;

        let notifier = Arc::new(MockNotifier::succeeding());
        let sweeper = NotificationSweeper::new(
            store.clone(),
            notifier.clone(),
            MessageCatalog::new(),
            clock.clone(),
        );

        clock.advance(Duration::minutes(3) - Duration::seconds(2));
        sweeper.sweep().await;
        let messages = notifier.messages();
        assert!(messages
            .iter()
            .any(|(_, text)| text.contains("5 seconds")));
    }
}
