//! Shared domain types: subscribers, reminder entries, and the audit trail.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable subscriber identity (a Telegram user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SubscriberId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(SubscriberId)
    }
}

impl From<i64> for SubscriberId {
    fn from(v: i64) -> Self {
        SubscriberId(v)
    }
}

/// Lifecycle status of a subscriber's access window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Expired,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Active => "active",
            SubscriberStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SubscriberStatus::Active),
            "expired" => Some(SubscriberStatus::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subscriber row: display fields plus the validity window.
///
/// `status == Active` means the engine considered the subscriber entitled
/// as of the last expiry sweep, not a live guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub status: SubscriberStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// Full display name, falling back to the numeric id.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.username) {
            (Some(first), _) if !first.is_empty() => first.clone(),
            (_, Some(user)) if !user.is_empty() => format!("@{user}"),
            _ => self.id.to_string(),
        }
    }
}

/// Kind of a scheduled reminder: the offset before expiry it represents.
///
/// This one enum is both the planning bucket entry and the message template
/// key, so the two tables cannot drift apart. The canonical wire tags are
/// `"{n}_days"`, `"{n}_minutes"`, and `"5_seconds"` for the fixed
/// last-moment entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Days(u32),
    Minutes(u32),
    FinalCountdown,
}

impl ReminderKind {
    /// Canonical tag stored in the ledger.
    pub fn tag(&self) -> String {
        match self {
            ReminderKind::Days(n) => format!("{n}_days"),
            ReminderKind::Minutes(n) => format!("{n}_minutes"),
            ReminderKind::FinalCountdown => "5_seconds".to_string(),
        }
    }

    /// Parse a ledger tag back into a kind. Unknown shapes return `None`.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        if tag == "5_seconds" {
            return Some(ReminderKind::FinalCountdown);
        }
        if let Some(n) = tag.strip_suffix("_days") {
            return n.parse().ok().map(ReminderKind::Days);
        }
        if let Some(n) = tag.strip_suffix("_minutes") {
            return n.parse().ok().map(ReminderKind::Minutes);
        }
        None
    }

    /// Whether this kind fires at the moment of expiry itself.
    pub fn is_zero_offset(&self) -> bool {
        matches!(self, ReminderKind::Days(0) | ReminderKind::Minutes(0))
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// One scheduled notification in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderEntry {
    pub id: i64,
    pub subscriber_id: SubscriberId,
    pub kind: String,
    pub due_at: DateTime<Utc>,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A due, unsent reminder joined with the display fields the sweeper needs
/// to render the message.
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub id: i64,
    pub subscriber_id: SubscriberId,
    pub kind: String,
    pub due_at: DateTime<Utc>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub valid_until: DateTime<Utc>,
}

/// Lifecycle actions recorded in the append-only audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Grant,
    Extend,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Grant => "grant",
            AuditAction::Extend => "extend",
        }
    }
}

/// Append-only audit record. Written on grant/extend, never read back by
/// the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub subscriber_id: SubscriberId,
    pub actor: Option<SubscriberId>,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_round_trip() {
        for kind in [
            ReminderKind::Days(7),
            ReminderKind::Days(0),
            ReminderKind::Minutes(60),
            ReminderKind::Minutes(1),
            ReminderKind::FinalCountdown,
        ] {
            assert_eq!(ReminderKind::parse_tag(&kind.tag()), Some(kind));
        }
    }

    #[test]
    fn kind_tag_formats() {
        assert_eq!(ReminderKind::Days(3).tag(), "3_days");
        assert_eq!(ReminderKind::Minutes(30).tag(), "30_minutes");
        assert_eq!(ReminderKind::FinalCountdown.tag(), "5_seconds");
    }

    #[test]
    fn unknown_tags_rejected() {
        assert_eq!(ReminderKind::parse_tag("weekly"), None);
        assert_eq!(ReminderKind::parse_tag("_days"), None);
        assert_eq!(ReminderKind::parse_tag("x_minutes"), None);
        assert_eq!(ReminderKind::parse_tag("10_seconds"), None);
    }

    #[test]
    fn zero_offset_detection() {
        assert!(ReminderKind::Days(0).is_zero_offset());
        assert!(ReminderKind::Minutes(0).is_zero_offset());
        assert!(!ReminderKind::Minutes(10).is_zero_offset());
        assert!(!ReminderKind::FinalCountdown.is_zero_offset());
    }

    #[test]
    fn status_round_trip() {
        assert_eq!(
            SubscriberStatus::parse(SubscriberStatus::Active.as_str()),
            Some(SubscriberStatus::Active)
        );
        assert_eq!(
            SubscriberStatus::parse(SubscriberStatus::Expired.as_str()),
            Some(SubscriberStatus::Expired)
        );
        assert_eq!(SubscriberStatus::parse("pending"), None);
    }

    #[test]
    fn subscriber_id_parses() {
        assert_eq!("42".parse::<SubscriberId>().unwrap(), SubscriberId(42));
        assert_eq!(" 42 ".parse::<SubscriberId>().unwrap(), SubscriberId(42));
        assert!("abc".parse::<SubscriberId>().is_err());
    }
}
