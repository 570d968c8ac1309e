// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Telegram Bot API client.
//!
//! Only the handful of methods the gate needs are wrapped: invite links,
//! member removal, direct messages and long-polled updates.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Timeout for ordinary Bot API calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time granted to `getUpdates` beyond its own long-poll timeout.
const LONG_POLL_SLACK: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram request failed: {0}")]
    Request(String),

    #[error("Telegram response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },
}

impl TelegramError {
    /// Whether the error means the user is not (or no longer) in the chat.
    pub fn is_absent_member(&self) -> bool {
        match self {
            TelegramError::Api { description, .. } => {
                let description = description.to_ascii_lowercase();
                description.contains("user not found")
                    || description.contains("participant_id_invalid")
                    || description.contains("user_not_participant")
                    || description.contains("member not found")
            }
            _ => false,
        }
    }
}

// =============================================================================
// Wire types
// =============================================================================

/// Envelope wrapping every Bot API response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatInviteLink {
    pub invite_link: String,
    #[serde(default)]
    pub member_limit: Option<u32>,
    #[serde(default)]
    pub expire_date: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SendMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_parameters: Option<ReplyParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReplyParameters {
    pub message_id: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebAppInfo {
    pub url: String,
}

// =============================================================================
// Client
// =============================================================================

#[derive(Debug, Clone)]
pub struct TelegramClient {
    api_base_url: String,
    bot_token: String,
    http: Client,
}

impl TelegramClient {
    pub fn new(api_base_url: &str, bot_token: &str) -> Result<Self, TelegramError> {
        let http = Client::builder()
            .build()
            .map_err(|e| TelegramError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            http,
        })
    }

    /// `createChatInviteLink`
    pub async fn create_chat_invite_link(
        &self,
        chat_id: i64,
        member_limit: u32,
        expire_date: i64,
    ) -> Result<ChatInviteLink, TelegramError> {
        #[derive(Serialize)]
        struct Body {
            chat_id: i64,
            member_limit: u32,
            expire_date: i64,
        }

        self.call(
            "createChatInviteLink",
            &Body {
                chat_id,
                member_limit,
                expire_date,
            },
            DEFAULT_REQUEST_TIMEOUT,
        )
        .await
    }

    /// `unbanChatMember` without `only_if_banned`: removes a current member
    /// and leaves them free to rejoin through a new invite.
    pub async fn unban_chat_member(&self, chat_id: i64, user_id: i64) -> Result<bool, TelegramError> {
        #[derive(Serialize)]
        struct Body {
            chat_id: i64,
            user_id: i64,
        }

        self.call(
            "unbanChatMember",
            &Body { chat_id, user_id },
            DEFAULT_REQUEST_TIMEOUT,
        )
        .await
    }

    /// `sendMessage`
    pub async fn send_message(&self, message: &SendMessage) -> Result<Message, TelegramError> {
        self.call("sendMessage", message, DEFAULT_REQUEST_TIMEOUT)
            .await
    }

    /// Plain-text `sendMessage`.
    pub async fn send_text(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        self.send_message(&SendMessage {
            chat_id,
            text: text.to_string(),
            reply_parameters: None,
            reply_markup: None,
        })
        .await
    }

    /// Long-poll `getUpdates`, restricted to messages.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> Result<Vec<Update>, TelegramError> {
        #[derive(Serialize)]
        struct Body {
            #[serde(skip_serializing_if = "Option::is_none")]
            offset: Option<i64>,
            timeout: u64,
            allowed_updates: [&'static str; 1],
        }

        self.call(
            "getUpdates",
            &Body {
                offset,
                timeout: timeout.as_secs(),
                allowed_updates: ["message"],
            },
            timeout + LONG_POLL_SLACK,
        )
        .await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, self.bot_token, method)
    }

    async fn call<B, R>(&self, method: &str, body: &B, timeout: Duration) -> Result<R, TelegramError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // The bot token is part of the URL; strip it from transport errors.
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TelegramError::Request(format!("{method}: {}", e.without_url())))?;

        let status = response.status();
        let envelope: ApiResponse<R> = response.json().await.map_err(|e| {
            TelegramError::InvalidResponse(format!("{method} returned {status}: {}", e.without_url()))
        })?;

        unwrap_envelope(method, envelope)
    }
}

fn unwrap_envelope<R>(method: &str, envelope: ApiResponse<R>) -> Result<R, TelegramError> {
    if !envelope.ok {
        return Err(TelegramError::Api {
            code: envelope.error_code.unwrap_or_default(),
            description: envelope
                .description
                .unwrap_or_else(|| format!("{method} failed without description")),
        });
    }

    envelope
        .result
        .ok_or_else(|| TelegramError::InvalidResponse(format!("{method} returned no result")))
}
