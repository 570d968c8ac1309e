// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-member async locks.
//!
//! Admission and audit-driven mutations of the same member take the same
//! lock, so an eviction and a re-admission never interleave on one record.
//! Locks for different members never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct MemberLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl MemberLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `member_id`.
    pub async fn lock(&self, member_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only referenced by the map are idle.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(member_id.to_string()).or_default().clone()
        };
        entry.lock_owned().await
    }

    /// Number of members currently locked or awaited.
    #[cfg(test)]
    fn active(&self) -> usize {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.values().filter(|lock| Arc::strong_count(lock) > 1).count()
    }
}
