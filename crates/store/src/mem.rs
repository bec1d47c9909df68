//! In-memory backend.
//!
//! Backs tests and offline tooling. A single write lock around the whole
//! table set stands in for the transaction the Postgres backend gets for
//! free: every multi-row mutation happens under one guard, so a grant or
//! replan is observed either fully applied or not at all.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use tollgate_core::{
    AuditAction, AuditEntry, DueReminder, GrantDuration, ReminderEntry, Subscriber, SubscriberId,
    SubscriberStatus,
};

use crate::error::StoreError;
use crate::planner::plan_reminders;
use crate::store::GrantRequest;

#[derive(Default)]
struct Tables {
    subscribers: HashMap<SubscriberId, Subscriber>,
    reminders: Vec<ReminderEntry>,
    audit: Vec<AuditEntry>,
    next_reminder_id: i64,
}

impl Tables {
    fn insert_reminders(
        &mut self,
        id: SubscriberId,
        now: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        total: chrono::Duration,
    ) {
        for planned in plan_reminders(now, valid_until, total) {
            self.next_reminder_id += 1;
            self.reminders.push(ReminderEntry {
                id: self.next_reminder_id,
                subscriber_id: id,
                kind: planned.kind.tag(),
                due_at: planned.due_at,
                sent: false,
                sent_at: None,
                created_at: now,
            });
        }
    }
}

/// In-memory subscription store and notification ledger.
pub struct MemStore {
    tables: RwLock<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    pub async fn grant(&self, req: &GrantRequest, now: DateTime<Utc>) -> Result<(), StoreError> {
        if req.duration.is_zero() {
            return Err(StoreError::EmptyDuration);
        }
        let valid_until = now + req.duration.to_chrono();

        let mut tables = self.tables.write().await;
        let created_at = tables
            .subscribers
            .get(&req.id)
            .map(|s| s.created_at)
            .unwrap_or(now);
        tables.subscribers.insert(
            req.id,
            Subscriber {
                id: req.id,
                username: req.username.clone(),
                first_name: req.first_name.clone(),
                last_name: req.last_name.clone(),
                valid_from: now,
                valid_until,
                status: SubscriberStatus::Active,
                created_at,
                updated_at: now,
            },
        );
        tables.audit.push(AuditEntry {
            action: AuditAction::Grant,
            subscriber_id: req.id,
            actor: req.actor,
            details: format!("Added for {}", req.duration),
            created_at: now,
        });
        // Unsent entries from the superseded window must never fire;
        // sent ones stay as history.
        tables
            .reminders
            .retain(|r| r.subscriber_id != req.id || r.sent);
        tables.insert_reminders(req.id, now, valid_until, req.duration.to_chrono());
        Ok(())
    }

    pub async fn extend(
        &self,
        id: SubscriberId,
        duration: GrantDuration,
        actor: Option<SubscriberId>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let (valid_from, new_until) = match tables.subscribers.get_mut(&id) {
            Some(sub) => {
                let new_until = sub.valid_until + duration.to_chrono();
                sub.valid_until = new_until;
                sub.status = SubscriberStatus::Active;
                sub.updated_at = now;
                (sub.valid_from, new_until)
            }
            None => return Ok(false),
        };
        tables.audit.push(AuditEntry {
            action: AuditAction::Extend,
            subscriber_id: id,
            actor,
            details: format!("Extended by {}", duration),
            created_at: now,
        });
        // Only unsent entries are superseded; sent ones stay as history.
        tables
            .reminders
            .retain(|r| r.subscriber_id != id || r.sent);
        let total = new_until - valid_from;
        tables.insert_reminders(id, now, new_until, total);
        Ok(true)
    }

    pub async fn get(&self, id: SubscriberId) -> Result<Option<Subscriber>, StoreError> {
        Ok(self.tables.read().await.subscribers.get(&id).cloned())
    }

    pub async fn list(
        &self,
        status: Option<SubscriberStatus>,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let tables = self.tables.read().await;
        let mut subs: Vec<Subscriber> = tables
            .subscribers
            .values()
            .filter(|s| status.map_or(true, |want| s.status == want))
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.valid_until);
        Ok(subs)
    }

    pub async fn set_status(
        &self,
        id: SubscriberId,
        status: SubscriberStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.subscribers.get_mut(&id) {
            Some(sub) => {
                sub.status = status;
                sub.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn remove(&self, id: SubscriberId) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        tables.reminders.retain(|r| r.subscriber_id != id);
        Ok(tables.subscribers.remove(&id).is_some())
    }

    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<DueReminder>, StoreError> {
        let tables = self.tables.read().await;
        let mut due: Vec<DueReminder> = tables
            .reminders
            .iter()
            .filter(|r| !r.sent && r.due_at <= now)
            .filter_map(|r| {
                let sub = tables.subscribers.get(&r.subscriber_id)?;
                Some(DueReminder {
                    id: r.id,
                    subscriber_id: r.subscriber_id,
                    kind: r.kind.clone(),
                    due_at: r.due_at,
                    username: sub.username.clone(),
                    first_name: sub.first_name.clone(),
                    valid_until: sub.valid_until,
                })
            })
            .collect();
        due.sort_by_key(|r| r.due_at);
        Ok(due)
    }

    pub async fn mark_sent(&self, reminder_id: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(entry) = tables
            .reminders
            .iter_mut()
            .find(|r| r.id == reminder_id && !r.sent)
        {
            entry.sent = true;
            entry.sent_at = Some(now);
        }
        Ok(())
    }

    pub async fn reminders_for(
        &self,
        id: SubscriberId,
    ) -> Result<Vec<ReminderEntry>, StoreError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<ReminderEntry> = tables
            .reminders
            .iter()
            .filter(|r| r.subscriber_id == id)
            .cloned()
            .collect();
        entries.sort_by_key(|r| r.due_at);
        Ok(entries)
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.tables.read().await.audit.clone()
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}
