//! Collaborator traits and shared error types.

use tollgate_core::SubscriberId;

/// Errors that can occur while talking to the messaging platform.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Delivers a rendered message to one subscriber.
///
/// Failures are non-fatal to the caller: the sweep leaves the entry
/// unsent and retries on its next tick.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: SubscriberId, text: &str) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "telegram").
    fn channel_name(&self) -> &str;
}

/// Controls a subscriber's access to the gated resource.
///
/// Both operations must be safe on an already-revoked/already-restored
/// subject; the engine treats failure as "try again next sweep".
#[async_trait::async_trait]
pub trait AccessGateway: Send + Sync {
    /// Ban the subscriber from the resource.
    async fn revoke(&self, subscriber: SubscriberId) -> Result<(), NotifyError>;

    /// Lift the ban so the subscriber can re-enter.
    async fn restore(&self, subscriber: SubscriberId) -> Result<(), NotifyError>;
}
