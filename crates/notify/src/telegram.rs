//! Telegram Bot API implementations of the collaborator traits.
//!
//! One [`TelegramClient`] wraps the Bot API transport; the notifier
//! (`sendMessage`) and the gateway (`banChatMember`/`unbanChatMember`)
//! share it. Handles the `ok` response envelope and 429 rate limits.

use tollgate_core::SubscriberId;

use crate::traits::{AccessGateway, Notifier, NotifyError};

/// Shared Bot API transport.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramClient {
    /// Returns [`NotifyError::Config`] if the token is empty.
    pub fn new(bot_token: String) -> Result<Self, NotifyError> {
        if bot_token.is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }
        Ok(Self {
            bot_token,
            client: reqwest::Client::new(),
        })
    }

    /// Call a Bot API method and unwrap the response envelope.
    pub async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/{}", self.bot_token, method);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            return Ok(resp_body.get("result").cloned().unwrap_or_default());
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");
        Err(NotifyError::Api(description.to_string()))
    }
}

/// Sends subscriber messages via `sendMessage` with HTML formatting.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: TelegramClient,
}

impl TelegramNotifier {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, to: SubscriberId, text: &str) -> Result<(), NotifyError> {
        tracing::debug!(subscriber = %to, "Sending Telegram notification");
        self.client
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": to.0,
                    "text": text,
                    "parse_mode": "HTML",
                }),
            )
            .await?;
        tracing::info!(subscriber = %to, "Telegram notification sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}

/// Bans and unbans subscribers in the gated channel.
///
/// Revoked subscribers stay banned so stale invite links cannot be
/// reused; the ban is lifted only on the restore path.
#[derive(Debug, Clone)]
pub struct TelegramGateway {
    client: TelegramClient,
    channel_id: String,
}

impl TelegramGateway {
    /// Returns [`NotifyError::Config`] if the channel id is empty.
    pub fn new(client: TelegramClient, channel_id: String) -> Result<Self, NotifyError> {
        if channel_id.is_empty() {
            return Err(NotifyError::Config(
                "Channel id must not be empty".to_string(),
            ));
        }
        Ok(Self { client, channel_id })
    }
}

#[async_trait::async_trait]
impl AccessGateway for TelegramGateway {
    async fn revoke(&self, subscriber: SubscriberId) -> Result<(), NotifyError> {
        self.client
            .call(
                "banChatMember",
                serde_json::json!({
                    "chat_id": self.channel_id,
                    "user_id": subscriber.0,
                    "revoke_messages": false,
                }),
            )
            .await?;
        tracing::info!(subscriber = %subscriber, "Channel access revoked");
        Ok(())
    }

    async fn restore(&self, subscriber: SubscriberId) -> Result<(), NotifyError> {
        self.client
            .call(
                "unbanChatMember",
                serde_json::json!({
                    "chat_id": self.channel_id,
                    "user_id": subscriber.0,
                    "only_if_banned": true,
                }),
            )
            .await?;
        tracing::info!(subscriber = %subscriber, "Channel access restored");
        Ok(())
    }
}
