//! Notification message catalog.
//!
//! Templates are keyed by [`ReminderKind`], the same enum the interval
//! planner schedules with, so the planning table and the rendering table
//! cannot drift apart. Rendering goes through minijinja with a fresh
//! environment per call since the template set is small and static.

use serde::Serialize;

use tollgate_core::ReminderKind;

use crate::traits::NotifyError;

const SEVEN_DAYS: &str =
    "⏳ <b>Subscription reminder</b>\n\nYour subscription ends in <b>7 days</b>, on <code>{{ expiry_date }}</code>.";
const THREE_DAYS: &str =
    "⏳ <b>Subscription reminder</b>\n\nYour subscription ends in <b>3 days</b>, on <code>{{ expiry_date }}</code>.";
const ONE_DAY: &str =
    "⚠️ <b>Subscription reminder</b>\n\nYour subscription ends <b>tomorrow</b>, on <code>{{ expiry_date }}</code>.";
const SIXTY_MINUTES: &str =
    "⚠️ <b>Subscription reminder</b>\n\nYour subscription ends in <b>1 hour</b>, at <code>{{ expiry_date }}</code>.";
const THIRTY_MINUTES: &str =
    "⚠️ <b>Subscription reminder</b>\n\nYour subscription ends in <b>30 minutes</b>, at <code>{{ expiry_date }}</code>.";
const TEN_MINUTES: &str =
    "⚠️ <b>Subscription reminder</b>\n\nYour subscription ends in <b>10 minutes</b>, at <code>{{ expiry_date }}</code>.";
const FIVE_MINUTES: &str =
    "🚨 <b>Subscription reminder</b>\n\nYour subscription ends in <b>5 minutes</b>, at <code>{{ expiry_date }}</code>.";
const TWO_MINUTES: &str =
    "🚨 <b>Subscription reminder</b>\n\nYour subscription ends in <b>2 minutes</b>, at <code>{{ expiry_date }}</code>.";
const ONE_MINUTE: &str =
    "🚨 <b>Subscription reminder</b>\n\nYour subscription ends in <b>1 minute</b>, at <code>{{ expiry_date }}</code>.";
const ZERO_OFFSET: &str =
    "🔚 <b>Subscription ended</b>\n\nYour subscription expired at <code>{{ expiry_date }}</code>.";
const FINAL_COUNTDOWN: &str =
    "🚨 <b>Your subscription ends in 5 seconds!</b>";
const EXPIRED_KICK: &str =
    "🔒 <b>Your subscription has ended</b> and you have been removed from the channel.";
const RENEW_PROMPT: &str =
    "💳 To renew your subscription, contact the administrators.";

/// Variables exposed to the reminder templates.
#[derive(Debug, Clone, Serialize)]
pub struct MessageContext {
    /// Expiry timestamp pre-formatted in the reference timezone.
    pub expiry_date: String,
}

/// Template lookup and rendering for all engine-originated messages.
#[derive(Debug, Default, Clone)]
pub struct MessageCatalog {
    _private: (),
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn template_for(kind: &ReminderKind) -> Option<&'static str> {
        match kind {
            ReminderKind::Days(7) => Some(SEVEN_DAYS),
            ReminderKind::Days(3) => Some(THREE_DAYS),
            ReminderKind::Days(1) => Some(ONE_DAY),
            ReminderKind::Minutes(60) => Some(SIXTY_MINUTES),
            ReminderKind::Minutes(30) => Some(THIRTY_MINUTES),
            ReminderKind::Minutes(10) => Some(TEN_MINUTES),
            ReminderKind::Minutes(5) => Some(FIVE_MINUTES),
            ReminderKind::Minutes(2) => Some(TWO_MINUTES),
            ReminderKind::Minutes(1) => Some(ONE_MINUTE),
            ReminderKind::Days(0) | ReminderKind::Minutes(0) => Some(ZERO_OFFSET),
            ReminderKind::FinalCountdown => Some(FINAL_COUNTDOWN),
            _ => None,
        }
    }

    /// Resolve a ledger tag to its template.
    ///
    /// Tags that don't match any planned kind but carry a legacy `0_`
    /// prefix fall back to the zero-offset template; everything else is
    /// skipped by the caller.
    pub fn resolve(&self, tag: &str) -> Option<&'static str> {
        if let Some(kind) = ReminderKind::parse_tag(tag) {
            if let Some(template) = Self::template_for(&kind) {
                return Some(template);
            }
        }
        if tag.starts_with("0_") {
            return Some(ZERO_OFFSET);
        }
        None
    }

    /// Render a template with the given context.
    pub fn render(&self, template: &str, ctx: &MessageContext) -> Result<String, NotifyError> {
        let env = minijinja::Environment::new();
        env.render_str(template, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Message sent right after a subscriber is removed on expiry.
    pub fn expired_kick_message(&self) -> String {
        format!("{EXPIRED_KICK}\n\n{RENEW_PROMPT}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MessageContext {
        MessageContext {
            expiry_date: "2026-03-08 03:00 PM".to_string(),
        }
    }

    #[test]
    fn every_planned_kind_has_a_template() {
        let kinds = [
            ReminderKind::Days(7),
            ReminderKind::Days(3),
            ReminderKind::Days(1),
            ReminderKind::Days(0),
            ReminderKind::Minutes(60),
            ReminderKind::Minutes(30),
            ReminderKind::Minutes(10),
            ReminderKind::Minutes(5),
            ReminderKind::Minutes(2),
            ReminderKind::Minutes(1),
            ReminderKind::Minutes(0),
            ReminderKind::FinalCountdown,
        ];
        let catalog = MessageCatalog::new();
        for kind in kinds {
            assert!(
                catalog.resolve(&kind.tag()).is_some(),
                "no template for {kind}"
            );
        }
    }

    #[test]
    fn legacy_zero_tags_fall_back() {
        let catalog = MessageCatalog::new();
        assert_eq!(catalog.resolve("0_hours"), Some(ZERO_OFFSET));
        assert_eq!(catalog.resolve("0_weeks"), Some(ZERO_OFFSET));
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let catalog = MessageCatalog::new();
        assert_eq!(catalog.resolve("12_days"), None);
        assert_eq!(catalog.resolve("weekly"), None);
        assert_eq!(catalog.resolve("45_minutes"), None);
    }

    #[test]
    fn render_injects_expiry_date() {
        let catalog = MessageCatalog::new();
        let template = catalog.resolve("7_days").unwrap();
        let rendered = catalog.render(template, &ctx()).unwrap();
        assert!(rendered.contains("2026-03-08 03:00 PM"));
        assert!(rendered.contains("7 days"));
    }

    #[test]
    fn kick_message_includes_renew_prompt() {
        let catalog = MessageCatalog::new();
        let message = catalog.expired_kick_message();
        assert!(message.contains("removed from the channel"));
        assert!(message.contains("renew"));
    }
}
