// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Member Storage
//!
//! Durable record of every admitted member, kept in an embedded redb
//! database under `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   members.redb      # member_id -> { wallet_address, joined_at, state }
//! ```
//!
//! The lifecycle state (`Active` / `Warned`) and the grace deadline are part
//! of each record, so a restart during a grace period does not lose the
//! pending recheck.

pub mod members;

pub use members::{
    MemberDatabase, MemberDbError, MemberDbResult, MemberState, MembershipStore, StoredMember,
    MEMBERS_DB_FILE,
};
