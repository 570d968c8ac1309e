// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Token Gate - Token-gated Telegram group membership
//!
//! Admits members who prove ownership of a wallet holding enough of an
//! ERC-20 token, and removes them once their balance drops below the bar.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - EVM balance reads and signature recovery
//! - `bot` - `/verify` chat command
//! - `group` - Group administration (invites, removals, DMs)
//! - `lifecycle` - Admission, daily audit, grace period and eviction
//! - `scheduler` - Daily audit and follow-up timers
//! - `storage` - Member records (redb)

pub mod api;
pub mod blockchain;
pub mod bot;
pub mod config;
pub mod error;
pub mod group;
pub mod lifecycle;
pub mod models;
pub mod providers;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod tls;

#[cfg(test)]
mod test_support;
