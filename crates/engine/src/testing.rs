//! Shared mock collaborators for engine tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use tollgate_core::{ManualClock, SubscriberId};
use tollgate_notify::{AccessGateway, Notifier, NotifyError};

/// Manual clock pinned to a fixed start instant.
pub fn test_clock() -> (Arc<ManualClock>, DateTime<Utc>) {
    let t0 = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    (Arc::new(ManualClock::new(t0, chrono_tz::UTC)), t0)
}

/// Records every send; failure mode can be toggled mid-test.
pub struct MockNotifier {
    sent: Mutex<Vec<(SubscriberId, String)>>,
    failing: AtomicBool,
}

impl MockNotifier {
    pub fn succeeding() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<(SubscriberId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, to: SubscriberId, text: &str) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Api("mock send failure".to_string()));
        }
        self.sent.lock().unwrap().push((to, text.to_string()));
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "mock"
    }
}

/// Counts revoke/restore calls; failure mode can be toggled mid-test.
pub struct MockGateway {
    pub revoked: AtomicUsize,
    pub restored: AtomicUsize,
    failing: AtomicBool,
}

impl MockGateway {
    pub fn succeeding() -> Self {
        Self {
            revoked: AtomicUsize::new(0),
            restored: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            revoked: AtomicUsize::new(0),
            restored: AtomicUsize::new(0),
            failing: AtomicBool::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn revoke_count(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }

    pub fn restore_count(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AccessGateway for MockGateway {
    async fn revoke(&self, _subscriber: SubscriberId) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Api("mock revoke failure".to_string()));
        }
        self.revoked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restore(&self, _subscriber: SubscriberId) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Api("mock restore failure".to_string()));
        }
        self.restored.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
