use std::env;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid timezone '{0}'")]
    BadTimezone(String),
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    pub database: DatabaseConfig,
    pub time: TimeConfig,
    pub sweep: SweepConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            bot: BotConfig::from_env(),
            database: DatabaseConfig::from_env(),
            time: TimeConfig::from_env(),
            sweep: SweepConfig::from_env(),
        }
    }

    /// Check the identifiers the engine cannot run without.
    ///
    /// Missing values here are fatal at startup; nothing is retried.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.token.is_empty() {
            return Err(ConfigError::Missing("BOT_TOKEN"));
        }
        if self.bot.channel_id.is_empty() {
            return Err(ConfigError::Missing("CHANNEL_ID"));
        }
        if self.database.url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        self.time.timezone()?;
        if self.bot.admin_ids.is_empty() {
            tracing::warn!("ADMIN_IDS is not set — running without operator allow-list");
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  bot:      token={}, channel={}, admins={}",
            if self.bot.token.is_empty() { "(none)" } else { "***" },
            self.bot.channel_id,
            self.bot.admin_ids.len()
        );
        tracing::info!(
            "  database: {}",
            if self.database.url.is_some() { "configured" } else { "(none)" }
        );
        tracing::info!("  time:     timezone={}", self.time.timezone_name);
        tracing::info!(
            "  sweep:    notifications={}s, expiry={}s",
            self.sweep.notification_interval_secs,
            self.sweep.expiry_interval_secs
        );
    }
}

// ── Bot / channel ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram Bot API token.
    pub token: String,
    /// The gated channel (numeric id or @name).
    pub channel_id: String,
    /// Operators allowed to manage subscriptions.
    pub admin_ids: Vec<i64>,
}

impl BotConfig {
    fn from_env() -> Self {
        // BOT_TOKEN preferred, TELEGRAM_TOKEN accepted for compatibility.
        let token = env_opt("BOT_TOKEN")
            .or_else(|| env_opt("TELEGRAM_TOKEN"))
            .unwrap_or_default();

        let admin_ids = env_or("ADMIN_IDS", "")
            .split(',')
            .filter_map(|part| {
                let part = part.trim();
                if part.is_empty() {
                    return None;
                }
                match part.parse::<i64>() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        tracing::warn!("Ignoring malformed ADMIN_IDS entry '{}'", part);
                        None
                    }
                }
            })
            .collect();

        Self {
            token,
            channel_id: env_or("CHANNEL_ID", ""),
            admin_ids,
        }
    }

    pub fn is_admin(&self, id: i64) -> bool {
        self.admin_ids.contains(&id)
    }
}

// ── Database ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

impl DatabaseConfig {
    fn from_env() -> Self {
        // Heroku-style postgres:// URLs are accepted and normalized.
        let url = env_opt("DATABASE_URL").map(|u| {
            if let Some(rest) = u.strip_prefix("postgres://") {
                format!("postgresql://{rest}")
            } else {
                u
            }
        });
        Self { url }
    }
}

// ── Time ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// IANA name of the reference timezone all display formatting uses.
    pub timezone_name: String,
}

impl TimeConfig {
    fn from_env() -> Self {
        Self {
            timezone_name: env_or("TIMEZONE", "Asia/Riyadh"),
        }
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        Tz::from_str(&self.timezone_name)
            .map_err(|_| ConfigError::BadTimezone(self.timezone_name.clone()))
    }
}

// ── Sweep cadence ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between notification sweeps.
    pub notification_interval_secs: u64,
    /// Seconds between expiry sweeps.
    pub expiry_interval_secs: u64,
}

impl SweepConfig {
    fn from_env() -> Self {
        Self {
            notification_interval_secs: env_u64("NOTIFICATION_SWEEP_SECS", 10),
            expiry_interval_secs: env_u64("EXPIRY_SWEEP_SECS", 30),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            notification_interval_secs: 10,
            expiry_interval_secs: 30,
        }
    }
}
