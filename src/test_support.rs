// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles for the lifecycle's collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use chrono::{DateTime, Utc};

use crate::blockchain::{BalanceCheck, BalanceOracle, OwnershipVerifier, DEFAULT_CHALLENGE};
use crate::group::{GroupControl, GroupControlError};
use crate::lifecycle::{LifecycleSettings, MembershipLifecycle};
use crate::storage::{
    MemberDatabase, MemberDbResult, MembershipStore, StoredMember,
};

/// Address and challenge signature of a deterministic test wallet.
pub fn signed_wallet(seed: u8) -> (String, String) {
    let signer = PrivateKeySigner::from_slice(&[seed; 32]).unwrap();
    let signature = signer.sign_message_sync(DEFAULT_CHALLENGE.as_bytes()).unwrap();
    (
        signer.address().to_string(),
        alloy::hex::encode_prefixed(signature.as_bytes()),
    )
}

/// An HTTP endpoint that accepts connections and never answers.
pub async fn silent_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

/// Insert an active member directly into the store.
pub fn seed_member(store: &CountingStore, member_id: &str, wallet: &str) -> StoredMember {
    let member = StoredMember::admitted(member_id, wallet, Utc::now());
    store.upsert(&member).unwrap();
    member
}

// =============================================================================
// Oracle
// =============================================================================

/// Balance oracle answering from a table; unknown addresses are insufficient.
#[derive(Clone, Default)]
pub struct MockOracle {
    balances: Arc<Mutex<HashMap<String, BalanceCheck>>>,
    calls: Arc<AtomicUsize>,
    before_next: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl MockOracle {
    pub fn set(&self, address: &str, check: BalanceCheck) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_lowercase(), check);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Run `action` while the next balance read is in flight.
    pub fn before_next_check(&self, action: impl FnOnce() + Send + 'static) {
        *self.before_next.lock().unwrap() = Some(Box::new(action));
    }
}

impl BalanceOracle for MockOracle {
    async fn check_balance(&self, address: &str) -> BalanceCheck {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let action = self.before_next.lock().unwrap().take();
        if let Some(action) = action {
            action();
        }
        self.balances
            .lock()
            .unwrap()
            .get(&address.to_lowercase())
            .copied()
            .unwrap_or(BalanceCheck::Insufficient)
    }
}

// =============================================================================
// Group control
// =============================================================================

/// Group control that records every call.
#[derive(Clone, Default)]
pub struct MockGroup {
    invites: Arc<Mutex<Vec<(u32, DateTime<Utc>)>>>,
    removed: Arc<Mutex<Vec<String>>>,
    messages: Arc<Mutex<Vec<(String, String)>>>,
    failing_removals: Arc<Mutex<HashSet<String>>>,
    fail_invites: Arc<AtomicBool>,
    fail_messages: Arc<AtomicBool>,
}

impl MockGroup {
    pub fn invites(&self) -> Vec<(u32, DateTime<Utc>)> {
        self.invites.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fail_invites(&self, fail: bool) {
        self.fail_invites.store(fail, Ordering::SeqCst);
    }

    pub fn fail_messages(&self, fail: bool) {
        self.fail_messages.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removal_of(&self, member_id: &str) {
        self.failing_removals
            .lock()
            .unwrap()
            .insert(member_id.to_string());
    }
}

impl GroupControl for MockGroup {
    async fn create_invite_link(
        &self,
        member_limit: u32,
        expire_at: DateTime<Utc>,
    ) -> Result<String, GroupControlError> {
        if self.fail_invites.load(Ordering::SeqCst) {
            return Err(GroupControlError::Transport("invites disabled".to_string()));
        }
        let mut invites = self.invites.lock().unwrap();
        invites.push((member_limit, expire_at));
        Ok(format!("https://t.me/+invite{}", invites.len()))
    }

    async fn remove_member(&self, member_id: &str) -> Result<(), GroupControlError> {
        if self.failing_removals.lock().unwrap().contains(member_id) {
            return Err(GroupControlError::Rejected("not enough rights".to_string()));
        }
        self.removed.lock().unwrap().push(member_id.to_string());
        Ok(())
    }

    async fn send_message(&self, member_id: &str, text: &str) -> Result<(), GroupControlError> {
        if self.fail_messages.load(Ordering::SeqCst) {
            return Err(GroupControlError::Rejected("bot was blocked by the user".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((member_id.to_string(), text.to_string()));
        Ok(())
    }
}

// =============================================================================
// Store
// =============================================================================

/// redb-backed store that counts committed deletions.
pub struct CountingStore {
    inner: MemberDatabase,
    deletions: AtomicUsize,
    _dir: tempfile::TempDir,
}

impl CountingStore {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let inner = MemberDatabase::open_in(dir.path()).unwrap();
        Self {
            inner,
            deletions: AtomicUsize::new(0),
            _dir: dir,
        }
    }

    pub fn deletions(&self) -> usize {
        self.deletions.load(Ordering::SeqCst)
    }
}

impl MembershipStore for CountingStore {
    fn upsert(&self, member: &StoredMember) -> MemberDbResult<()> {
        self.inner.upsert(member)
    }

    fn get(&self, member_id: &str) -> MemberDbResult<Option<StoredMember>> {
        self.inner.get(member_id)
    }

    fn get_all(&self) -> MemberDbResult<Vec<StoredMember>> {
        self.inner.get_all()
    }

    fn delete(&self, member_id: &str) -> MemberDbResult<()> {
        if self.inner.get(member_id)?.is_some() {
            self.deletions.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.delete(member_id)
    }

    fn mark_warned(
        &self,
        member_id: &str,
        expected_wallet: &str,
        warned_at: DateTime<Utc>,
        grace_deadline: DateTime<Utc>,
    ) -> MemberDbResult<bool> {
        self.inner
            .mark_warned(member_id, expected_wallet, warned_at, grace_deadline)
    }

    fn restore_active(
        &self,
        member_id: &str,
        cycle: Option<DateTime<Utc>>,
    ) -> MemberDbResult<bool> {
        self.inner.restore_active(member_id, cycle)
    }

    fn delete_if_warned(&self, member_id: &str, cycle: DateTime<Utc>) -> MemberDbResult<bool> {
        let deleted = self.inner.delete_if_warned(member_id, cycle)?;
        if deleted {
            self.deletions.fetch_add(1, Ordering::SeqCst);
        }
        Ok(deleted)
    }
}

// =============================================================================
// Harness
// =============================================================================

pub type TestLifecycle = MembershipLifecycle<MockOracle, MockGroup, CountingStore>;

/// A lifecycle wired to mocks, with handles to inspect them.
pub struct Harness {
    pub lifecycle: Arc<TestLifecycle>,
    pub oracle: MockOracle,
    pub group: MockGroup,
    pub store: Arc<CountingStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(LifecycleSettings::default())
    }

    pub fn with_settings(settings: LifecycleSettings) -> Self {
        let oracle = MockOracle::default();
        let group = MockGroup::default();
        let store = Arc::new(CountingStore::new());
        let lifecycle = Arc::new(MembershipLifecycle::new(
            OwnershipVerifier::default(),
            oracle.clone(),
            group.clone(),
            store.clone(),
            settings,
        ));

        Self {
            lifecycle,
            oracle,
            group,
            store,
        }
    }
}
