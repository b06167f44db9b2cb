// ABOUTME: Minimal Telegram Bot API client for long polling and replies
// ABOUTME: Wraps getUpdates and sendMessage with typed payloads and AppError failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Telegram Transport
//!
//! Only the two Bot API methods the relay needs are wrapped: `getUpdates`
//! for long polling and `sendMessage` for replies. The polling loop itself
//! lives in [`bot`].

pub mod bot;

pub use bot::TelegramBot;

use crate::constants::telegram::{API_BASE, MAX_MESSAGE_CHARS};
use crate::utils::http_client::long_poll_client;
use bodycomp_core::{AppError, AppResult, ErrorCode, UserId};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Envelope of every Bot API answer
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

/// One incoming update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update id
    pub update_id: i64,
    /// New message, if the update is one
    #[serde(default)]
    pub message: Option<Message>,
}

/// Incoming chat message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Id within the chat
    pub message_id: i64,
    /// Sender; absent for channel posts
    #[serde(default)]
    pub from: Option<Sender>,
    /// Chat the message belongs to
    pub chat: Chat,
    /// Text body; absent for media messages
    #[serde(default)]
    pub text: Option<String>,
}

/// Message sender
#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    /// Telegram user id
    pub id: i64,
}

/// Chat reference
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat id
    pub id: i64,
}

/// A text message the relay should answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundText {
    /// Sender
    pub user: UserId,
    /// Chat to reply in
    pub chat_id: i64,
    /// Message to reply to
    pub message_id: i64,
    /// Raw text
    pub text: String,
}

impl Update {
    /// Text message from a user, excluding bot commands
    #[must_use]
    pub fn inbound_text(&self) -> Option<InboundText> {
        let message = self.message.as_ref()?;
        let from = message.from.as_ref()?;
        let text = message.text.as_ref()?;
        if text.trim_start().starts_with('/') {
            return None;
        }
        Some(InboundText {
            user: UserId(from.id),
            chat_id: message.chat.id,
            message_id: message.message_id,
            text: text.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Serialize)]
struct ReplyParameters {
    message_id: i64,
    allow_sending_without_reply: bool,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

/// Cut `text` to the Bot API message limit on a char boundary
#[must_use]
pub fn clamp_message(text: &str) -> &str {
    text.char_indices()
        .nth(MAX_MESSAGE_CHARS)
        .map_or(text, |(idx, _)| &text[..idx])
}

/// Bot API client bound to one bot token
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    endpoint: String,
}

impl fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramClient")
            .field("endpoint", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Client for `token`, sized for polls of `poll_timeout_secs`
    #[must_use]
    pub fn new(token: &str, poll_timeout_secs: u64) -> Self {
        Self::with_api_base(API_BASE, token, poll_timeout_secs)
    }

    /// Client against a different Bot API server
    #[must_use]
    pub fn with_api_base(api_base: &str, token: &str, poll_timeout_secs: u64) -> Self {
        Self {
            http: long_poll_client(poll_timeout_secs),
            endpoint: format!("{}/bot{token}", api_base.trim_end_matches('/')),
        }
    }

    async fn call<P, T>(&self, method: &str, payload: &P) -> AppResult<T>
    where
        P: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.endpoint))
            .json(payload)
            .send()
            .await
            // Bot token is part of the URL; keep it out of the message
            .map_err(|e| {
                AppError::external_unavailable("Telegram", format!("{method} request failed"))
                    .with_source(e.without_url())
            })?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            AppError::external_service("Telegram", format!("{method} returned {status}"))
                .with_source(e.without_url())
        })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                description,
                error_code,
                ..
            } => {
                let code = match error_code {
                    Some(429) => ErrorCode::ExternalRateLimited,
                    Some(401 | 403) => ErrorCode::ExternalAuthFailed,
                    _ => ErrorCode::ExternalServiceError,
                };
                Err(AppError::new(
                    code,
                    format!(
                        "Telegram {method} failed: {}",
                        description.unwrap_or_else(|| status.to_string())
                    ),
                ))
            }
        }
    }

    /// Long-poll for updates after `offset`
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an API-level error
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> AppResult<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &GetUpdates {
                    offset,
                    timeout: timeout_secs,
                    allowed_updates: ["message"],
                },
            )
            .await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "Received updates");
        }
        Ok(updates)
    }

    /// Send `text` to `chat_id`, optionally as a reply
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or an API-level error
    pub async fn send_message(&self, chat_id: i64, text: &str, reply_to: Option<i64>) -> AppResult<()> {
        let payload = SendMessage {
            chat_id,
            text: clamp_message(text),
            reply_parameters: reply_to.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
        };
        let _sent: serde_json::Value = self.call("sendMessage", &payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_inbound_text_from_message() {
        let u = update(
            r#"{"update_id":10,"message":{"message_id":5,"from":{"id":42,"is_bot":false,"first_name":"A"},"chat":{"id":42,"type":"private"},"date":1,"text":"70.5\n24.1"}}"#,
        );
        assert_eq!(
            u.inbound_text(),
            Some(InboundText {
                user: UserId(42),
                chat_id: 42,
                message_id: 5,
                text: "70.5\n24.1".into(),
            })
        );
    }

    #[test]
    fn test_commands_and_media_are_skipped() {
        let command = update(
            r#"{"update_id":11,"message":{"message_id":6,"from":{"id":42},"chat":{"id":42},"text":"/start"}}"#,
        );
        assert!(command.inbound_text().is_none());

        let photo = update(
            r#"{"update_id":12,"message":{"message_id":7,"from":{"id":42},"chat":{"id":42},"photo":[]}}"#,
        );
        assert!(photo.inbound_text().is_none());

        let edited = update(r#"{"update_id":13,"edited_message":{}}"#);
        assert!(edited.inbound_text().is_none());
    }

    #[test]
    fn test_error_envelope() {
        let envelope: ApiResponse<Vec<Update>> = serde_json::from_str(
            r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
        )
        .unwrap();
        assert!(!envelope.ok);
        assert_eq!(envelope.error_code, Some(401));
        assert!(envelope.result.is_none());
    }

    #[test]
    fn test_clamp_message() {
        assert_eq!(clamp_message("short"), "short");
        let long = "é".repeat(MAX_MESSAGE_CHARS + 10);
        assert_eq!(clamp_message(&long).chars().count(), MAX_MESSAGE_CHARS);
    }

    #[test]
    fn test_send_message_payload() {
        let payload = SendMessage {
            chat_id: 1,
            text: "hi",
            reply_parameters: Some(ReplyParameters {
                message_id: 9,
                allow_sending_without_reply: true,
            }),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["reply_parameters"]["message_id"], 9);
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TelegramClient::new("123:secret", 30);
        assert!(!format!("{client:?}").contains("secret"));
    }
}
