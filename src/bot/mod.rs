// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chat Command Surface
//!
//! The bot answers `/verify`: in a private chat with a button that opens the
//! verification page, in a group with a nudge to continue in private.
//!
//! - `commands` - pure mapping from an incoming message to a reply
//! - `poller` - `getUpdates` long-poll loop that feeds `commands`

pub mod commands;
pub mod poller;

pub use commands::{reply_to, GROUP_DEFLECTION, PRIVATE_GREETING, VERIFY_BUTTON_TEXT};
pub use poller::UpdatePoller;
