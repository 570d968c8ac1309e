// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Control surface of the gated group.
//!
//! The lifecycle only needs three things from the chat platform: mint a
//! single-use invite link, remove a member, and message a member directly.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::providers::telegram::{TelegramClient, TelegramError};

/// Errors reported by a group-control backend.
#[derive(Debug, thiserror::Error)]
pub enum GroupControlError {
    #[error("member id `{0}` is not valid for this platform")]
    InvalidMemberId(String),

    #[error("platform rejected the request: {0}")]
    Rejected(String),

    #[error("platform unreachable: {0}")]
    Transport(String),
}

/// Operations the membership lifecycle performs on the group.
pub trait GroupControl: Send + Sync {
    /// Create an invite link usable `member_limit` times until `expire_at`.
    fn create_invite_link(
        &self,
        member_limit: u32,
        expire_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<String, GroupControlError>> + Send;

    /// Remove a member from the group.
    ///
    /// Removing someone who is not in the group succeeds.
    fn remove_member(
        &self,
        member_id: &str,
    ) -> impl Future<Output = Result<(), GroupControlError>> + Send;

    /// Send a direct message to a member.
    fn send_message(
        &self,
        member_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), GroupControlError>> + Send;
}

/// A Telegram group controlled through the Bot API.
#[derive(Clone)]
pub struct TelegramGroup {
    client: Arc<TelegramClient>,
    chat_id: i64,
}

impl TelegramGroup {
    pub fn new(client: Arc<TelegramClient>, chat_id: i64) -> Self {
        Self { client, chat_id }
    }
}

fn telegram_user_id(member_id: &str) -> Result<i64, GroupControlError> {
    member_id
        .trim()
        .parse()
        .map_err(|_| GroupControlError::InvalidMemberId(member_id.to_string()))
}

impl From<TelegramError> for GroupControlError {
    fn from(e: TelegramError) -> Self {
        match e {
            TelegramError::Api { .. } => GroupControlError::Rejected(e.to_string()),
            other => GroupControlError::Transport(other.to_string()),
        }
    }
}

impl GroupControl for TelegramGroup {
    async fn create_invite_link(
        &self,
        member_limit: u32,
        expire_at: DateTime<Utc>,
    ) -> Result<String, GroupControlError> {
        let link = self
            .client
            .create_chat_invite_link(self.chat_id, member_limit, expire_at.timestamp())
            .await?;
        Ok(link.invite_link)
    }

    async fn remove_member(&self, member_id: &str) -> Result<(), GroupControlError> {
        let user_id = telegram_user_id(member_id)?;
        match self.client.unban_chat_member(self.chat_id, user_id).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_absent_member() => {
                tracing::debug!(member_id, "Member already gone from group");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn send_message(&self, member_id: &str, text: &str) -> Result<(), GroupControlError> {
        let user_id = telegram_user_id(member_id)?;
        self.client.send_text(user_id, text).await?;
        Ok(())
    }
}
