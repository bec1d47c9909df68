//! PostgreSQL backend.
//!
//! Runtime-checked queries over a `PgPool`; grant/extend run inside one
//! transaction so the subscriber upsert, audit row, reminder clear, and
//! reminder batch land together or not at all. Schema is created on
//! startup with `IF NOT EXISTS` DDL.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::info;

use tollgate_core::{
    AuditAction, DueReminder, GrantDuration, ReminderEntry, Subscriber, SubscriberId,
    SubscriberStatus,
};

use crate::error::StoreError;
use crate::planner::{plan_reminders, PlannedReminder};
use crate::store::GrantRequest;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS subscribers (
        user_id BIGINT PRIMARY KEY,
        username TEXT,
        first_name TEXT,
        last_name TEXT,
        valid_from TIMESTAMPTZ NOT NULL,
        valid_until TIMESTAMPTZ NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS reminders (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL REFERENCES subscribers (user_id) ON DELETE CASCADE,
        kind TEXT NOT NULL,
        due_at TIMESTAMPTZ NOT NULL,
        sent BOOLEAN NOT NULL DEFAULT FALSE,
        sent_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS audit_log (
        id BIGSERIAL PRIMARY KEY,
        action TEXT NOT NULL,
        user_id BIGINT NOT NULL,
        actor BIGINT,
        details TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE INDEX IF NOT EXISTS idx_subscribers_status ON subscribers (status)",
    "CREATE INDEX IF NOT EXISTS idx_subscribers_valid_until ON subscribers (valid_until)",
    "CREATE INDEX IF NOT EXISTS idx_reminders_user_id ON reminders (user_id)",
    "CREATE INDEX IF NOT EXISTS idx_reminders_sent ON reminders (sent)",
    "CREATE INDEX IF NOT EXISTS idx_audit_log_user_id ON audit_log (user_id)",
];

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Subscriber {
        id: SubscriberId(row.try_get("user_id")?),
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        valid_from: row.try_get("valid_from")?,
        valid_until: row.try_get("valid_until")?,
        status: SubscriberStatus::parse(&status).unwrap_or(SubscriberStatus::Expired),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Postgres-backed subscription store and notification ledger.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and initialize the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await?;
        let store = Self { pool };
        store.init_schema().await?;
        info!("Postgres store ready");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn insert_reminders(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: SubscriberId,
        now: DateTime<Utc>,
        planned: &[PlannedReminder],
    ) -> Result<(), StoreError> {
        for reminder in planned {
            sqlx::query(
                "INSERT INTO reminders (user_id, kind, due_at, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id.0)
            .bind(reminder.kind.tag())
            .bind(reminder.due_at)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn insert_audit(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        action: AuditAction,
        id: SubscriberId,
        actor: Option<SubscriberId>,
        details: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO audit_log (action, user_id, actor, details, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(action.as_str())
        .bind(id.0)
        .bind(actor.map(|a| a.0))
        .bind(details)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn grant(&self, req: &GrantRequest, now: DateTime<Utc>) -> Result<(), StoreError> {
        if req.duration.is_zero() {
            return Err(StoreError::EmptyDuration);
        }
        let valid_until = now + req.duration.to_chrono();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO subscribers
                 (user_id, username, first_name, last_name,
                  valid_from, valid_until, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'active', $7, $7)
             ON CONFLICT (user_id) DO UPDATE SET
                 username = EXCLUDED.username,
                 first_name = EXCLUDED.first_name,
                 last_name = EXCLUDED.last_name,
                 valid_from = EXCLUDED.valid_from,
                 valid_until = EXCLUDED.valid_until,
                 status = 'active',
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(req.id.0)
        .bind(&req.username)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(now)
        .bind(valid_until)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            AuditAction::Grant,
            req.id,
            req.actor,
            &format!("Added for {}", req.duration),
            now,
        )
        .await?;

        // Unsent entries from the superseded window must never fire;
        // sent ones stay as history.
        sqlx::query("DELETE FROM reminders WHERE user_id = $1 AND sent = FALSE")
            .bind(req.id.0)
            .execute(&mut *tx)
            .await?;

        let planned = plan_reminders(now, valid_until, req.duration.to_chrono());
        Self::insert_reminders(&mut tx, req.id, now, &planned).await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn extend(
        &self,
        id: SubscriberId,
        duration: GrantDuration,
        actor: Option<SubscriberId>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT valid_from, valid_until FROM subscribers WHERE user_id = $1 FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(false);
        };
        let valid_from: DateTime<Utc> = row.try_get("valid_from").map_err(StoreError::Sqlx)?;
        let valid_until: DateTime<Utc> = row.try_get("valid_until").map_err(StoreError::Sqlx)?;
        let new_until = valid_until + duration.to_chrono();

        sqlx::query(
            "UPDATE subscribers
             SET valid_until = $2, status = 'active', updated_at = $3
             WHERE user_id = $1",
        )
        .bind(id.0)
        .bind(new_until)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        Self::insert_audit(
            &mut tx,
            AuditAction::Extend,
            id,
            actor,
            &format!("Extended by {}", duration),
            now,
        )
        .await?;

        // Only unsent entries are superseded; sent ones stay as history.
        sqlx::query("DELETE FROM reminders WHERE user_id = $1 AND sent = FALSE")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        let planned = plan_reminders(now, new_until, new_until - valid_from);
        Self::insert_reminders(&mut tx, id, now, &planned).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn get(&self, id: SubscriberId) -> Result<Option<Subscriber>, StoreError> {
        let row = sqlx::query("SELECT * FROM subscribers WHERE user_id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref()
            .map(subscriber_from_row)
            .transpose()
            .map_err(StoreError::Sqlx)
    }

    pub async fn list(
        &self,
        status: Option<SubscriberStatus>,
    ) -> Result<Vec<Subscriber>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM subscribers WHERE status = $1 ORDER BY valid_until",
                )
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM subscribers ORDER BY valid_until")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter()
            .map(subscriber_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlx)
    }

    pub async fn set_status(
        &self,
        id: SubscriberId,
        status: SubscriberStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE subscribers SET status = $2, updated_at = $3 WHERE user_id = $1",
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(&self, id: SubscriberId) -> Result<bool, StoreError> {
        // Reminders first so the cascade holds even without FK support.
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reminders WHERE user_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM subscribers WHERE user_id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<DueReminder>, StoreError> {
        let rows = sqlx::query(
            "SELECT r.id, r.user_id, r.kind, r.due_at,
                    s.username, s.first_name, s.valid_until
             FROM reminders r
             JOIN subscribers s ON r.user_id = s.user_id
             WHERE r.sent = FALSE AND r.due_at <= $1
             ORDER BY r.due_at",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DueReminder {
                    id: row.try_get("id")?,
                    subscriber_id: SubscriberId(row.try_get("user_id")?),
                    kind: row.try_get("kind")?,
                    due_at: row.try_get("due_at")?,
                    username: row.try_get("username")?,
                    first_name: row.try_get("first_name")?,
                    valid_until: row.try_get("valid_until")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::Sqlx)
    }

    pub async fn mark_sent(&self, reminder_id: i64, now: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE reminders SET sent = TRUE, sent_at = $2 WHERE id = $1 AND sent = FALSE")
            .bind(reminder_id)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn reminders_for(
        &self,
        id: SubscriberId,
    ) -> Result<Vec<ReminderEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM reminders WHERE user_id = $1 ORDER BY due_at")
            .bind(id.0)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(ReminderEntry {
                    id: row.try_get("id")?,
                    subscriber_id: SubscriberId(row.try_get("user_id")?),
                    kind: row.try_get("kind")?,
                    due_at: row.try_get("due_at")?,
                    sent: row.try_get("sent")?,
                    sent_at: row.try_get("sent_at")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::Sqlx)
    }
}
