// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::providers::telegram::{
    ChatKind, InlineKeyboardButton, InlineKeyboardMarkup, Message, ReplyParameters, SendMessage,
    WebAppInfo,
};

pub const PRIVATE_GREETING: &str = "Wassup, fren! To join the exclusive Memelord HQ, tap the button below to connect your wallet and get verified.";
pub const GROUP_DEFLECTION: &str = "Psst... DM me to get verified and join the party.";
pub const VERIFY_BUTTON_TEXT: &str = "Verify Wallet";

const VERIFY_COMMAND: &str = "/verify";

/// `/verify` or `/verify@SomeBot` as the first word of `text`.
fn is_verify_command(text: &str) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    match command.strip_prefix(VERIFY_COMMAND) {
        Some("") => true,
        Some(rest) => rest.starts_with('@') && rest.len() > 1,
        None => false,
    }
}

/// Reply owed to `message`, if any.
pub fn reply_to(message: &Message, verify_page_url: &str) -> Option<SendMessage> {
    let text = message.text.as_deref()?;
    if !is_verify_command(text) {
        return None;
    }

    match message.chat.kind {
        ChatKind::Private => Some(SendMessage {
            chat_id: message.chat.id,
            text: PRIVATE_GREETING.to_string(),
            reply_parameters: None,
            reply_markup: Some(InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: VERIFY_BUTTON_TEXT.to_string(),
                    web_app: Some(WebAppInfo {
                        url: verify_page_url.to_string(),
                    }),
                }]],
            }),
        }),
        ChatKind::Group | ChatKind::Supergroup => Some(SendMessage {
            chat_id: message.chat.id,
            text: GROUP_DEFLECTION.to_string(),
            reply_parameters: Some(ReplyParameters {
                message_id: message.message_id,
            }),
            reply_markup: None,
        }),
        ChatKind::Channel | ChatKind::Unknown => None,
    }
}
