//! Telegram Bot API adapter.
//!
//! Implements [`Notifier`] for private notices and operator alerts, and
//! [`Poster`] for the public channel. Claim buttons are inline keyboards whose
//! callback data carries the request id (`claim:<id>`); a disabled button
//! carries `full:<id>` so presses are acknowledged without claiming.

use crate::config::TelegramConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use shiftmatch_core::error::PortError;
use shiftmatch_core::ports::{ClaimAffordance, Notifier, Poster};
use shiftmatch_core::store::BoxFuture;
use shiftmatch_core::types::{PostRef, UserId};
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot API envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Bot API client bound to one bot token and one public channel.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    endpoint: String,
    channel_id: i64,
    tech_chat_id: Option<i64>,
    enabled: bool,
}

impl TelegramClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be constructed.
    pub fn new(config: &TelegramConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let token = config.bot_token.trim();
        Ok(Self {
            http,
            endpoint: format!("{}/bot{token}", config.api_base.trim_end_matches('/')),
            channel_id: config.channel_id,
            tech_chat_id: (config.tech_chat_id != 0).then_some(config.tech_chat_id),
            enabled: !token.is_empty(),
        })
    }

    /// Whether a bot token is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, PortError> {
        if !self.enabled {
            return Err(PortError::Rejected("bot token not configured".into()));
        }

        let response = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.without_url().to_string()))?;

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| PortError::Transport(e.without_url().to_string()))?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(PortError::Rejected(
                description.unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }

    async fn send_message(&self, chat_id: i64, text: String) -> Result<(), PortError> {
        let _: SentMessage = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }
}

/// Inline keyboard holding the claim button.
#[must_use]
pub fn reply_markup(affordance: &ClaimAffordance) -> Value {
    let action = if affordance.enabled { "claim" } else { "full" };
    json!({
        "inline_keyboard": [[{
            "text": affordance.label,
            "callback_data": format!("{action}:{}", affordance.request_id),
        }]]
    })
}

fn is_benign(error: &PortError, needle: &str) -> bool {
    matches!(error, PortError::Rejected(description) if description.contains(needle))
}

impl Notifier for TelegramClient {
    fn send(&self, user: UserId, text: String) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move { self.send_message(user.value(), text).await })
    }

    fn alert(&self, text: String) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            match self.tech_chat_id {
                Some(chat_id) => self.send_message(chat_id, text).await,
                None => {
                    warn!(alert = %text, "Operator alert (no tech chat configured)");
                    Ok(())
                }
            }
        })
    }
}

impl Poster for TelegramClient {
    fn publish(&self, text: String, affordance: ClaimAffordance) -> BoxFuture<'_, Result<PostRef, PortError>> {
        Box::pin(async move {
            let sent: SentMessage = self
                .call(
                    "sendMessage",
                    json!({
                        "chat_id": self.channel_id,
                        "text": text,
                        "reply_markup": reply_markup(&affordance),
                    }),
                )
                .await?;
            Ok(PostRef::new(sent.message_id))
        })
    }

    fn update(&self, post: PostRef, text: String, affordance: ClaimAffordance) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            let result: Result<Value, PortError> = self
                .call(
                    "editMessageText",
                    json!({
                        "chat_id": self.channel_id,
                        "message_id": post.value(),
                        "text": text,
                        "reply_markup": reply_markup(&affordance),
                    }),
                )
                .await;
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_benign(&e, "message is not modified") => {
                    debug!(post = %post, "Posting already up to date");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
    }

    fn retract(&self, post: PostRef) -> BoxFuture<'_, Result<(), PortError>> {
        Box::pin(async move {
            let result: Result<bool, PortError> = self
                .call(
                    "deleteMessage",
                    json!({ "chat_id": self.channel_id, "message_id": post.value() }),
                )
                .await;
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_benign(&e, "message to delete not found") => {
                    debug!(post = %post, "Posting already removed");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use shiftmatch_core::types::RequestId;

    #[test]
    fn enabled_button_claims() {
        let markup = reply_markup(&ClaimAffordance {
            request_id: RequestId::new(12),
            label: "Respond".into(),
            enabled: true,
        });
        assert_eq!(markup["inline_keyboard"][0][0]["callback_data"], "claim:12");
        assert_eq!(markup["inline_keyboard"][0][0]["text"], "Respond");
    }

    #[test]
    fn disabled_button_does_not_claim() {
        let markup = reply_markup(&ClaimAffordance {
            request_id: RequestId::new(12),
            label: "No slots (5/5)".into(),
            enabled: false,
        });
        assert_eq!(markup["inline_keyboard"][0][0]["callback_data"], "full:12");
    }

    #[tokio::test]
    async fn missing_token_fails_fast() {
        let client = TelegramClient::new(&TelegramConfig {
            bot_token: String::new(),
            api_base: "http://127.0.0.1:1".into(),
            channel_id: 1,
            tech_chat_id: 0,
        })
        .unwrap();
        assert!(!client.is_enabled());
        let result = client.send(UserId::new(5), "hi".into()).await;
        assert!(matches!(result, Err(PortError::Rejected(_))));
    }
}
