// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded member database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `members`: member_id → serialized StoredMember (JSON bytes)
//!
//! Conditional updates (`mark_warned`, `restore_active`, `delete_if_warned`)
//! read and write inside one write transaction, so an audit acting on a stale
//! snapshot cannot clobber a record rewritten by a newer admission.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: member_id → serialized StoredMember (JSON bytes).
const MEMBERS: TableDefinition<&str, &[u8]> = TableDefinition::new("members");

/// File name of the member database inside the data directory.
pub const MEMBERS_DB_FILE: &str = "members.redb";

// =============================================================================
// Records
// =============================================================================

/// Lifecycle state persisted with each member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MemberState {
    /// Admitted and in good standing.
    Active,
    /// Failed a daily audit; evicted at `grace_deadline` unless topped up.
    Warned {
        warned_at: DateTime<Utc>,
        grace_deadline: DateTime<Utc>,
    },
}

/// A gated member as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMember {
    /// Chat platform user id
    pub member_id: String,
    /// Lowercased wallet address
    pub wallet_address: String,
    /// Server time of (re-)admission
    pub joined_at: DateTime<Utc>,
    pub state: MemberState,
}

impl StoredMember {
    /// A freshly admitted member.
    pub fn admitted(member_id: &str, wallet_address: &str, joined_at: DateTime<Utc>) -> Self {
        Self {
            member_id: member_id.to_string(),
            wallet_address: wallet_address.trim().to_lowercase(),
            joined_at,
            state: MemberState::Active,
        }
    }

    /// Whether this record was warned by the audit cycle started at `warned_at`.
    pub fn is_warned_at(&self, cycle: DateTime<Utc>) -> bool {
        matches!(self.state, MemberState::Warned { warned_at, .. } if warned_at == cycle)
    }
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MemberDbError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MemberDbResult<T> = Result<T, MemberDbError>;

// =============================================================================
// Store contract
// =============================================================================

/// Durable keyed set of gated members.
///
/// Implementations must make `delete` idempotent and `get_all` a snapshot.
pub trait MembershipStore: Send + Sync {
    /// Insert or overwrite the record for `member.member_id`.
    fn upsert(&self, member: &StoredMember) -> MemberDbResult<()>;

    fn get(&self, member_id: &str) -> MemberDbResult<Option<StoredMember>>;

    /// Snapshot of every record.
    fn get_all(&self) -> MemberDbResult<Vec<StoredMember>>;

    /// Remove a record. Absent records are not an error.
    fn delete(&self, member_id: &str) -> MemberDbResult<()>;

    /// Set `Warned` if the record still exists with `expected_wallet`.
    fn mark_warned(
        &self,
        member_id: &str,
        expected_wallet: &str,
        warned_at: DateTime<Utc>,
        grace_deadline: DateTime<Utc>,
    ) -> MemberDbResult<bool>;

    /// Return a member to `Active`.
    ///
    /// With `Some(cycle)` only a record warned by that cycle is touched; with
    /// `None` any warned record is reset.
    fn restore_active(&self, member_id: &str, cycle: Option<DateTime<Utc>>)
        -> MemberDbResult<bool>;

    /// Delete the record only if it is still warned by `cycle`.
    fn delete_if_warned(&self, member_id: &str, cycle: DateTime<Utc>) -> MemberDbResult<bool>;
}

// =============================================================================
// MemberDatabase
// =============================================================================

/// Embedded ACID member database.
pub struct MemberDatabase {
    db: Database,
}

impl MemberDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> MemberDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(MEMBERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Open `members.redb` inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> MemberDbResult<Self> {
        Self::open(&data_dir.join(MEMBERS_DB_FILE))
    }

    /// Number of stored members.
    pub fn count(&self) -> MemberDbResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMBERS)?;
        Ok(table.len()?)
    }

    /// Read-modify-write of one record inside a single write transaction.
    ///
    /// `apply` returns the new value (`Some`), a deletion (`None`), or
    /// declines the change by returning `Err(())`. Returns whether a change
    /// was committed.
    fn update_with<F>(&self, member_id: &str, apply: F) -> MemberDbResult<bool>
    where
        F: FnOnce(StoredMember) -> Result<Option<StoredMember>, ()>,
    {
        let write_txn = self.db.begin_write()?;
        let changed = {
            let mut table = write_txn.open_table(MEMBERS)?;

            let existing = match table.get(member_id)? {
                Some(value) => Some(serde_json::from_slice::<StoredMember>(value.value())?),
                None => None,
            };

            match existing.map(apply) {
                None | Some(Err(())) => false,
                Some(Ok(Some(updated))) => {
                    let json = serde_json::to_vec(&updated)?;
                    table.insert(member_id, json.as_slice())?;
                    true
                }
                Some(Ok(None)) => {
                    table.remove(member_id)?;
                    true
                }
            }
        };

        if changed {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(changed)
    }
}

impl MembershipStore for MemberDatabase {
    fn upsert(&self, member: &StoredMember) -> MemberDbResult<()> {
        let json = serde_json::to_vec(member)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MEMBERS)?;
            table.insert(member.member_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, member_id: &str) -> MemberDbResult<Option<StoredMember>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMBERS)?;
        match table.get(member_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> MemberDbResult<Vec<StoredMember>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MEMBERS)?;

        let mut members = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            match serde_json::from_slice::<StoredMember>(value.value()) {
                Ok(member) => members.push(member),
                Err(e) => {
                    tracing::warn!(
                        member_id = %key.value(),
                        error = %e,
                        "Skipping malformed member record"
                    );
                }
            }
        }
        Ok(members)
    }

    fn delete(&self, member_id: &str) -> MemberDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(MEMBERS)?;
            table.remove(member_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn mark_warned(
        &self,
        member_id: &str,
        expected_wallet: &str,
        warned_at: DateTime<Utc>,
        grace_deadline: DateTime<Utc>,
    ) -> MemberDbResult<bool> {
        let expected_wallet = expected_wallet.to_lowercase();
        self.update_with(member_id, |mut member| {
            if member.wallet_address != expected_wallet {
                return Err(());
            }
            member.state = MemberState::Warned {
                warned_at,
                grace_deadline,
            };
            Ok(Some(member))
        })
    }

    fn restore_active(
        &self,
        member_id: &str,
        cycle: Option<DateTime<Utc>>,
    ) -> MemberDbResult<bool> {
        self.update_with(member_id, |mut member| {
            let matches = match cycle {
                Some(cycle) => member.is_warned_at(cycle),
                None => matches!(member.state, MemberState::Warned { .. }),
            };
            if !matches {
                return Err(());
            }
            member.state = MemberState::Active;
            Ok(Some(member))
        })
    }

    fn delete_if_warned(&self, member_id: &str, cycle: DateTime<Utc>) -> MemberDbResult<bool> {
        self.update_with(member_id, |member| {
            if member.is_warned_at(cycle) {
                Ok(None)
            } else {
                Err(())
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
