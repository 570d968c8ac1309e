// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Membership Lifecycle
//!
//! The state machine behind the gate:
//!
//! ```text
//! Unverified --admit--> Active --audit fails--> Warned --recheck fails--> Removed
//!                         ^                        |
//!                         +----recheck passes------+
//! ```
//!
//! - **Entry** ([`MembershipLifecycle::admit`]): ownership proof, balance
//!   check, single-use invite link, member record.
//! - **Exit** ([`MembershipLifecycle::run_daily_audit`] and
//!   [`MembershipLifecycle::run_follow_up`]): daily balance audit, warning,
//!   grace period, recheck, eviction.
//!
//! The lifecycle does not own any timers; the scheduler decides when audits
//! and follow-ups run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::blockchain::{BalanceCheck, BalanceOracle, OwnershipVerifier};
use crate::group::{GroupControl, GroupControlError};
use crate::storage::{MemberDbError, MembershipStore, StoredMember};

mod audit;
pub mod locks;

pub use audit::{AuditReport, GraceFollowUp, RecheckReport};
use locks::MemberLocks;

/// Number of joins an invite link allows.
pub const INVITE_MEMBER_LIMIT: u32 = 1;

/// Lifetime of an invite link.
pub const INVITE_TTL_SECS: i64 = 5 * 60;

/// Default delay between the audit warning and the recheck.
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 60 * 60;

/// How the audit treats a balance that could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutagePolicy {
    /// An unreadable balance counts as insufficient: warn, then evict.
    #[default]
    FailClosed,
    /// Neither warn nor evict on an unreadable balance; wait for the next
    /// audit. Admission still fails closed.
    Hold,
}

/// Tunables of the exit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub grace_period: TimeDelta,
    pub outage_policy: OutagePolicy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            grace_period: TimeDelta::seconds(DEFAULT_GRACE_PERIOD_SECS),
            outage_policy: OutagePolicy::default(),
        }
    }
}

/// A single-use invite handed to a freshly admitted member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteGrant {
    pub invite_link: String,
    pub member_limit: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Why an admission did not produce an invite.
#[derive(Debug, thiserror::Error)]
pub enum AdmitError {
    #[error("signature does not match the claimed wallet")]
    SignatureMismatch,

    #[error("wallet balance is below the required amount")]
    InsufficientBalance,

    #[error("invite link could not be created: {0}")]
    InviteIssuance(#[source] GroupControlError),

    #[error("member record could not be saved: {0}")]
    Persistence(#[source] MemberDbError),
}

impl AdmitError {
    /// Faults of the service, as opposed to outcomes caused by the caller.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AdmitError::InviteIssuance(_) | AdmitError::Persistence(_)
        )
    }
}

/// Decision taken for one balance result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pass,
    Fail,
    Defer,
}

/// Orchestrates admission, audits and evictions.
pub struct MembershipLifecycle<O, G, S> {
    verifier: OwnershipVerifier,
    oracle: O,
    group: G,
    store: Arc<S>,
    locks: MemberLocks,
    settings: LifecycleSettings,
}

impl<O, G, S> MembershipLifecycle<O, G, S>
where
    O: BalanceOracle,
    G: GroupControl,
    S: MembershipStore,
{
    pub fn new(
        verifier: OwnershipVerifier,
        oracle: O,
        group: G,
        store: Arc<S>,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            verifier,
            oracle,
            group,
            store,
            locks: MemberLocks::new(),
            settings,
        }
    }

    /// Admit `member_id` if `signature` proves ownership of a wallet with
    /// enough balance.
    ///
    /// On success a single-use invite link expiring five minutes from now is
    /// returned and the member record is (over)written as `Active`.
    pub async fn admit(
        &self,
        member_id: &str,
        wallet_address: &str,
        signature: &str,
    ) -> Result<InviteGrant, AdmitError> {
        let wallet = wallet_address.trim().to_lowercase();

        if !self.verifier.verify(&wallet, signature) {
            tracing::warn!(member_id, wallet = %wallet, "Signature verification failed");
            return Err(AdmitError::SignatureMismatch);
        }

        if !self.oracle.has_minimum_balance(&wallet).await {
            tracing::info!(member_id, wallet = %wallet, "Admission refused: balance too low");
            return Err(AdmitError::InsufficientBalance);
        }

        let _guard = self.locks.lock(member_id).await;

        let issued_at = Utc::now();
        let expires_at = issued_at + TimeDelta::seconds(INVITE_TTL_SECS);

        let invite_link = self
            .group
            .create_invite_link(INVITE_MEMBER_LIMIT, expires_at)
            .await
            .map_err(|e| {
                tracing::error!(member_id, error = %e, "Failed to create invite link");
                AdmitError::InviteIssuance(e)
            })?;

        let member = StoredMember::admitted(member_id, &wallet, issued_at);
        self.store.upsert(&member).map_err(|e| {
            tracing::error!(
                member_id,
                error = %e,
                "Invite link issued but member record was not saved"
            );
            AdmitError::Persistence(e)
        })?;

        tracing::info!(member_id, wallet = %wallet, %expires_at, "Member admitted");

        Ok(InviteGrant {
            invite_link,
            member_limit: INVITE_MEMBER_LIMIT,
            issued_at,
            expires_at,
        })
    }

    fn verdict(&self, check: BalanceCheck) -> Verdict {
        match (check, self.settings.outage_policy) {
            (BalanceCheck::Sufficient, _) => Verdict::Pass,
            (BalanceCheck::Insufficient, _) => Verdict::Fail,
            (BalanceCheck::Unavailable, OutagePolicy::FailClosed) => Verdict::Fail,
            (BalanceCheck::Unavailable, OutagePolicy::Hold) => Verdict::Defer,
        }
    }
}

/// Type-erased admission entry point used by the HTTP layer.
pub trait AdmissionGate: Send + Sync {
    fn admit<'a>(
        &'a self,
        member_id: &'a str,
        wallet_address: &'a str,
        signature: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<InviteGrant, AdmitError>> + Send + 'a>>;

    /// Number of members on record, for readiness probes.
    fn member_count(&self) -> Result<usize, MemberDbError>;
}

impl<O, G, S> AdmissionGate for MembershipLifecycle<O, G, S>
where
    O: BalanceOracle,
    G: GroupControl,
    S: MembershipStore,
{
    fn admit<'a>(
        &'a self,
        member_id: &'a str,
        wallet_address: &'a str,
        signature: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<InviteGrant, AdmitError>> + Send + 'a>> {
        Box::pin(MembershipLifecycle::admit(
            self,
            member_id,
            wallet_address,
            signature,
        ))
    }

    fn member_count(&self) -> Result<usize, MemberDbError> {
        self.store.get_all().map(|members| members.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemberState;
    use crate::test_support::{signed_wallet, Harness};

    #[tokio::test]
    async fn admit_issues_single_use_invite_and_stores_lowercased_wallet() {
        let harness = Harness::new();
        let (address, signature) = signed_wallet(0x42);
        harness.oracle.set(&address, BalanceCheck::Sufficient);

        let checksummed = address.clone();
        let grant = harness
            .lifecycle
            .admit("42", &checksummed, &signature)
            .await
            .expect("admission succeeds");

        assert_eq!(grant.member_limit, 1);
        assert_eq!(grant.expires_at - grant.issued_at, TimeDelta::minutes(5));
        assert!(grant.invite_link.starts_with("https://t.me/+"));

        let invites = harness.group.invites();
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0], (1, grant.expires_at));

        let stored = harness.store.get("42").unwrap().unwrap();
        assert_eq!(stored.wallet_address, address.to_lowercase());
        assert_eq!(stored.joined_at, grant.issued_at);
        assert_eq!(stored.state, MemberState::Active);
    }

    #[tokio::test]
    async fn admit_rejects_signature_from_another_wallet() {
        let harness = Harness::new();
        let (claimed, _) = signed_wallet(0x01);
        let (other, other_signature) = signed_wallet(0x02);
        harness.oracle.set(&claimed, BalanceCheck::Sufficient);
        harness.oracle.set(&other, BalanceCheck::Sufficient);

        let result = harness.lifecycle.admit("7", &claimed, &other_signature).await;

        assert!(matches!(result, Err(AdmitError::SignatureMismatch)));
        assert!(harness.store.get("7").unwrap().is_none());
        assert!(harness.group.invites().is_empty());
        assert_eq!(harness.oracle.calls(), 0);
    }

    #[tokio::test]
    async fn admit_rejects_low_balance_without_side_effects() {
        let harness = Harness::new();
        let (address, signature) = signed_wallet(0x03);
        harness.oracle.set(&address, BalanceCheck::Insufficient);

        let result = harness.lifecycle.admit("8", &address, &signature).await;

        let err = result.unwrap_err();
        assert!(matches!(err, AdmitError::InsufficientBalance));
        assert!(!err.is_internal());
        assert!(harness.store.get("8").unwrap().is_none());
        assert!(harness.group.invites().is_empty());
    }

    #[tokio::test]
    async fn admit_fails_closed_when_chain_is_unavailable() {
        let harness = Harness::with_settings(LifecycleSettings {
            outage_policy: OutagePolicy::Hold,
            ..LifecycleSettings::default()
        });
        let (address, signature) = signed_wallet(0x04);
        harness.oracle.set(&address, BalanceCheck::Unavailable);

        let result = harness.lifecycle.admit("9", &address, &signature).await;
        assert!(matches!(result, Err(AdmitError::InsufficientBalance)));
    }

    #[tokio::test]
    async fn invite_failure_is_internal_and_saves_nothing() {
        let harness = Harness::new();
        let (address, signature) = signed_wallet(0x05);
        harness.oracle.set(&address, BalanceCheck::Sufficient);
        harness.group.fail_invites(true);

        let err = harness
            .lifecycle
            .admit("10", &address, &signature)
            .await
            .unwrap_err();

        assert!(matches!(err, AdmitError::InviteIssuance(_)));
        assert!(err.is_internal());
        assert!(harness.store.get("10").unwrap().is_none());
    }

    #[tokio::test]
    async fn readmission_overwrites_record_and_resets_state() {
        let harness = Harness::new();
        let (first, first_sig) = signed_wallet(0x06);
        let (second, second_sig) = signed_wallet(0x07);
        harness.oracle.set(&first, BalanceCheck::Sufficient);
        harness.oracle.set(&second, BalanceCheck::Sufficient);

        harness.lifecycle.admit("11", &first, &first_sig).await.unwrap();
        let now = Utc::now();
        harness
            .store
            .mark_warned("11", &first, now, now + TimeDelta::hours(1))
            .unwrap();

        harness.lifecycle.admit("11", &second, &second_sig).await.unwrap();

        let stored = harness.store.get("11").unwrap().unwrap();
        assert_eq!(stored.wallet_address, second.to_lowercase());
        assert_eq!(stored.state, MemberState::Active);
        assert_eq!(harness.store.get_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn admission_gate_counts_members() {
        let harness = Harness::new();
        let (address, signature) = signed_wallet(0x08);
        harness.oracle.set(&address, BalanceCheck::Sufficient);

        let gate: &dyn AdmissionGate = &*harness.lifecycle;
        assert_eq!(gate.member_count().unwrap(), 0);
        gate.admit("12", &address, &signature).await.unwrap();
        assert_eq!(gate.member_count().unwrap(), 1);
    }
}
