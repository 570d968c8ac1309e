// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the verification endpoint. Field names are
//! camelCase on the wire to match the verification web page.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Proof submitted by the verification page.
#[derive(Debug, Clone, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyWalletRequest {
    /// Telegram user id. Accepted as a JSON string or integer.
    #[serde(deserialize_with = "member_id")]
    #[schema(value_type = String, example = "123456789")]
    pub user_id: String,
    /// Claimed wallet address, any casing.
    #[schema(example = "0x742d35cc6634c0532925a3b844bc9e7595f4ab12")]
    pub wallet_address: String,
    /// `0x`-prefixed 65-byte EIP-191 signature over the challenge message.
    pub signature: String,
}

/// Outcome of a verification attempt. Also the body of every error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyWalletResponse {
    pub success: bool,
    /// Single-use invite link, present on success only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invite_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyWalletResponse {
    pub fn invited(invite_link: impl Into<String>) -> Self {
        Self {
            success: true,
            invite_link: Some(invite_link.into()),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            invite_link: None,
            message: Some(message.into()),
        }
    }
}

fn member_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s.trim().to_string(),
        Repr::Number(n) => n.to_string(),
    })
}
