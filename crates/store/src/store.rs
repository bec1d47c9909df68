//! The public store surface.
//!
//! Storage failures never propagate to the scheduling layer: every
//! operation catches the backend error, logs it, and reports a boolean
//! failure or an empty result. Sweeps retry naturally on their next tick.

use std::sync::Arc;

use tracing::error;

use tollgate_core::{
    Clock, DueReminder, GrantDuration, ReminderEntry, Subscriber, SubscriberId, SubscriberStatus,
};

use crate::error::StoreError;
use crate::mem::MemStore;
use crate::pg::PgStore;

/// Everything needed to create or fully replace a subscriber's window.
#[derive(Debug, Clone)]
pub struct GrantRequest {
    pub id: SubscriberId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub duration: GrantDuration,
    pub actor: Option<SubscriberId>,
}

/// Unified storage backend.
pub enum StoreBackend {
    Postgres(PgStore),
    Memory(MemStore),
}

/// Subscription store plus notification ledger over a single backend.
pub struct Store {
    backend: StoreBackend,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub fn new(backend: StoreBackend, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Connect to Postgres and initialize the schema.
    pub async fn connect(url: &str, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let pg = PgStore::connect(url).await?;
        Ok(Self::new(StoreBackend::Postgres(pg), clock))
    }

    /// Ephemeral store for tests and offline tooling.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(StoreBackend::Memory(MemStore::new()), clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Upsert the subscriber, reset the window, and replan reminders.
    pub async fn grant(&self, req: &GrantRequest) -> bool {
        let now = self.clock.now();
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.grant(req, now).await,
            StoreBackend::Memory(mem) => mem.grant(req, now).await,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(subscriber = %req.id, error = %e, "Failed to grant subscription");
                false
            }
        }
    }

    /// Push `valid_until` forward and replan from the original `valid_from`.
    /// Returns false for unknown subscribers.
    pub async fn extend(
        &self,
        id: SubscriberId,
        duration: GrantDuration,
        actor: Option<SubscriberId>,
    ) -> bool {
        let now = self.clock.now();
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.extend(id, duration, actor, now).await,
            StoreBackend::Memory(mem) => mem.extend(id, duration, actor, now).await,
        };
        match result {
            Ok(extended) => extended,
            Err(e) => {
                error!(subscriber = %id, error = %e, "Failed to extend subscription");
                false
            }
        }
    }

    pub async fn get(&self, id: SubscriberId) -> Option<Subscriber> {
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.get(id).await,
            StoreBackend::Memory(mem) => mem.get(id).await,
        };
        result.unwrap_or_else(|e| {
            error!(subscriber = %id, error = %e, "Failed to read subscriber");
            None
        })
    }

    /// Subscribers (optionally filtered by status), soonest-expiring first.
    pub async fn list(&self, status: Option<SubscriberStatus>) -> Vec<Subscriber> {
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.list(status).await,
            StoreBackend::Memory(mem) => mem.list(status).await,
        };
        result.unwrap_or_else(|e| {
            error!(error = %e, "Failed to list subscribers");
            Vec::new()
        })
    }

    pub async fn set_status(&self, id: SubscriberId, status: SubscriberStatus) -> bool {
        let now = self.clock.now();
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.set_status(id, status, now).await,
            StoreBackend::Memory(mem) => mem.set_status(id, status, now).await,
        };
        result.unwrap_or_else(|e| {
            error!(subscriber = %id, error = %e, "Failed to update subscriber status");
            false
        })
    }

    /// Delete the subscriber and all of its reminder entries.
    pub async fn remove(&self, id: SubscriberId) -> bool {
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.remove(id).await,
            StoreBackend::Memory(mem) => mem.remove(id).await,
        };
        result.unwrap_or_else(|e| {
            error!(subscriber = %id, error = %e, "Failed to remove subscriber");
            false
        })
    }

    /// Unsent entries whose due time has arrived, joined with display fields.
    pub async fn due_reminders(&self) -> Vec<DueReminder> {
        let now = self.clock.now();
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.due_reminders(now).await,
            StoreBackend::Memory(mem) => mem.due_reminders(now).await,
        };
        result.unwrap_or_else(|e| {
            error!(error = %e, "Failed to query due reminders");
            Vec::new()
        })
    }

    /// Flag an entry as delivered. Re-marking a sent entry is a no-op.
    pub async fn mark_sent(&self, reminder_id: i64) -> bool {
        let now = self.clock.now();
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.mark_sent(reminder_id, now).await,
            StoreBackend::Memory(mem) => mem.mark_sent(reminder_id, now).await,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(reminder = reminder_id, error = %e, "Failed to mark reminder sent");
                false
            }
        }
    }

    pub async fn reminders_for(&self, id: SubscriberId) -> Vec<ReminderEntry> {
        let result = match &self.backend {
            StoreBackend::Postgres(pg) => pg.reminders_for(id).await,
            StoreBackend::Memory(mem) => mem.reminders_for(id).await,
        };
        result.unwrap_or_else(|e| {
            error!(subscriber = %id, error = %e, "Failed to query reminders");
            Vec::new()
        })
    }
}
