// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Daily balance audit and grace-period follow-up.
//!
//! Every step is isolated per member: a failed notification, store write or
//! removal is logged and counted, and the loop moves on.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use uuid::Uuid;

use super::{MembershipLifecycle, Verdict};
use crate::blockchain::BalanceOracle;
use crate::group::{GroupControl, GroupControlError};
use crate::storage::{MemberDbError, MemberState, MembershipStore, StoredMember};

/// Direct message sent to members who fail the daily audit.
pub fn warning_message(grace_period: TimeDelta) -> String {
    format!(
        "Uh oh, fren! Our daily check shows your bags are looking a little light.\n\n\
         You have {} to get that token count up or the bot will have to say 'gm' to you \
         from a distance. Don't get rekt!",
        describe_span(grace_period)
    )
}

fn describe_span(span: TimeDelta) -> String {
    let minutes = span.num_minutes().max(1);
    match (minutes / 60, minutes % 60) {
        (1, 0) => "1 hour".to_string(),
        (hours, 0) => format!("{hours} hours"),
        (_, _) if minutes == 1 => "1 minute".to_string(),
        _ => format!("{minutes} minutes"),
    }
}

/// The single deferred recheck owed to the members warned by one audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraceFollowUp {
    /// Correlates logs of the audit and its follow-up.
    pub cycle_id: Uuid,
    /// Start of the audit that issued the warnings.
    pub cycle_started_at: DateTime<Utc>,
    /// When the recheck is due.
    pub deadline: DateTime<Utc>,
    pub members: Vec<String>,
}

/// Outcome of one daily audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Members in the snapshot.
    pub checked: usize,
    pub passed: usize,
    pub warned: Vec<String>,
    /// Members whose balance could not be read under the `hold` policy.
    pub deferred: Vec<String>,
    pub notify_failures: usize,
    pub store_failures: usize,
    /// Set when at least one member was warned.
    pub follow_up: Option<GraceFollowUp>,
}

impl AuditReport {
    fn new(cycle_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id,
            started_at,
            checked: 0,
            passed: 0,
            warned: Vec::new(),
            deferred: Vec::new(),
            notify_failures: 0,
            store_failures: 0,
            follow_up: None,
        }
    }

    /// Whether the audit found no members and hit no store errors.
    pub fn is_empty(&self) -> bool {
        self.checked == 0 && self.store_failures == 0
    }
}

/// Outcome of one grace-period follow-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecheckReport {
    pub evicted: Vec<String>,
    pub reprieved: Vec<String>,
    /// Balance unreadable under the `hold` policy; left warned.
    pub deferred: Vec<String>,
    /// Re-admitted or already gone since the warning.
    pub skipped: Vec<String>,
    /// Removal or store failures; the record stays warned.
    pub failed: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum EvictionError {
    #[error("group removal failed: {0}")]
    Group(#[from] GroupControlError),

    #[error("member store failed: {0}")]
    Store(#[from] MemberDbError),
}

impl<O, G, S> MembershipLifecycle<O, G, S>
where
    O: BalanceOracle,
    G: GroupControl,
    S: MembershipStore,
{
    /// Check every member's balance and warn those below the threshold.
    ///
    /// Warned members are persisted as `Warned` with a grace deadline; the
    /// returned report carries the follow-up the caller must run at that
    /// deadline.
    pub async fn run_daily_audit(&self) -> AuditReport {
        let started_at = Utc::now();
        let cycle_id = Uuid::new_v4();
        let mut report = AuditReport::new(cycle_id, started_at);

        tracing::info!(%cycle_id, "Running daily token balance check");

        let members = match self.store.get_all() {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "Could not load members for audit");
                report.store_failures += 1;
                return report;
            }
        };

        if members.is_empty() {
            tracing::info!(%cycle_id, "No members to check");
            return report;
        }

        let grace_deadline = started_at + self.settings.grace_period;
        report.checked = members.len();

        for member in &members {
            let check = self.oracle.check_balance(&member.wallet_address).await;

            match self.verdict(check) {
                Verdict::Pass => {
                    report.passed += 1;
                    if matches!(member.state, MemberState::Warned { .. }) {
                        self.clear_stale_warning(member, &mut report).await;
                    }
                }
                Verdict::Defer => {
                    tracing::warn!(
                        %cycle_id,
                        member_id = %member.member_id,
                        "Balance unavailable, deferring decision to next audit"
                    );
                    report.deferred.push(member.member_id.clone());
                }
                Verdict::Fail => {
                    if self
                        .warn_member(member, started_at, grace_deadline, &mut report)
                        .await
                    {
                        report.warned.push(member.member_id.clone());
                    }
                }
            }
        }

        if !report.warned.is_empty() {
            report.follow_up = Some(GraceFollowUp {
                cycle_id,
                cycle_started_at: started_at,
                deadline: grace_deadline,
                members: report.warned.clone(),
            });
        }

        tracing::info!(
            %cycle_id,
            checked = report.checked,
            passed = report.passed,
            warned = report.warned.len(),
            deferred = report.deferred.len(),
            "Daily token balance check complete"
        );

        report
    }

    /// Persist the warning and notify the member. Returns whether the member
    /// joins this cycle's follow-up.
    async fn warn_member(
        &self,
        member: &StoredMember,
        warned_at: DateTime<Utc>,
        grace_deadline: DateTime<Utc>,
        report: &mut AuditReport,
    ) -> bool {
        let member_id = member.member_id.as_str();
        let cycle_id = report.cycle_id;

        let marked = {
            let _guard = self.locks.lock(member_id).await;
            self.store
                .mark_warned(member_id, &member.wallet_address, warned_at, grace_deadline)
        };

        match marked {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(
                    %cycle_id,
                    member_id,
                    "Member record changed since snapshot, not warning"
                );
                return false;
            }
            Err(e) => {
                tracing::error!(%cycle_id, member_id, error = %e, "Could not persist warning");
                report.store_failures += 1;
                return false;
            }
        }

        tracing::info!(
            %cycle_id,
            member_id,
            %grace_deadline,
            "Member no longer has enough tokens, sending warning"
        );

        let warning = warning_message(self.settings.grace_period);
        if let Err(e) = self.group.send_message(member_id, &warning).await {
            tracing::warn!(%cycle_id, member_id, error = %e, "Could not send warning");
            report.notify_failures += 1;
        }

        true
    }

    async fn clear_stale_warning(&self, member: &StoredMember, report: &mut AuditReport) {
        let _guard = self.locks.lock(&member.member_id).await;
        if let Err(e) = self.store.restore_active(&member.member_id, None) {
            tracing::error!(
                cycle_id = %report.cycle_id,
                member_id = %member.member_id,
                error = %e,
                "Could not clear stale warning"
            );
            report.store_failures += 1;
        }
    }

    /// Recheck the members warned by one audit and evict those still short.
    pub async fn run_follow_up(&self, follow_up: &GraceFollowUp) -> RecheckReport {
        let cycle_id = follow_up.cycle_id;
        let cycle = follow_up.cycle_started_at;
        let mut report = RecheckReport::default();

        tracing::info!(
            %cycle_id,
            members = follow_up.members.len(),
            "Performing final check for warned users"
        );

        for member_id in &follow_up.members {
            let member = match self.store.get(member_id) {
                Ok(Some(member)) if member.is_warned_at(cycle) => member,
                Ok(_) => {
                    tracing::info!(%cycle_id, member_id = %member_id, "Warning no longer current, skipping");
                    report.skipped.push(member_id.clone());
                    continue;
                }
                Err(e) => {
                    tracing::error!(%cycle_id, member_id = %member_id, error = %e, "Could not load warned member");
                    report.failed.push(member_id.clone());
                    continue;
                }
            };

            let check = self.oracle.check_balance(&member.wallet_address).await;

            match self.verdict(check) {
                Verdict::Pass => {
                    let _guard = self.locks.lock(member_id).await;
                    match self.store.restore_active(member_id, Some(cycle)) {
                        Ok(true) => {
                            tracing::info!(
                                %cycle_id,
                                member_id = %member_id,
                                "Member topped up their balance and stays in the group"
                            );
                            report.reprieved.push(member_id.clone());
                        }
                        Ok(false) => {
                            tracing::info!(%cycle_id, member_id = %member_id, "Warning no longer current, skipping");
                            report.skipped.push(member_id.clone());
                        }
                        Err(e) => {
                            tracing::error!(%cycle_id, member_id = %member_id, error = %e, "Could not clear warning");
                            report.failed.push(member_id.clone());
                        }
                    }
                }
                Verdict::Defer => {
                    tracing::warn!(
                        %cycle_id,
                        member_id = %member_id,
                        "Balance unavailable at recheck, eviction suppressed"
                    );
                    report.deferred.push(member_id.clone());
                }
                Verdict::Fail => match self.evict(member_id, cycle).await {
                    Ok(true) => {
                        tracing::info!(%cycle_id, member_id = %member_id, "Member removed from group and store");
                        report.evicted.push(member_id.clone());
                    }
                    Ok(false) => {
                        tracing::info!(%cycle_id, member_id = %member_id, "Member re-admitted during recheck, skipping");
                        report.skipped.push(member_id.clone());
                    }
                    Err(e) => {
                        tracing::error!(%cycle_id, member_id = %member_id, error = %e, "Error removing member");
                        report.failed.push(member_id.clone());
                    }
                },
            }
        }

        tracing::info!(
            %cycle_id,
            evicted = report.evicted.len(),
            reprieved = report.reprieved.len(),
            failed = report.failed.len(),
            "Final check complete"
        );

        report
    }

    /// Remove the member from the group, then delete the record.
    ///
    /// Runs under the member lock and only while the record is still warned
    /// by `cycle`; a concurrent re-admission wins.
    async fn evict(&self, member_id: &str, cycle: DateTime<Utc>) -> Result<bool, EvictionError> {
        let _guard = self.locks.lock(member_id).await;

        match self.store.get(member_id)? {
            Some(member) if member.is_warned_at(cycle) => {}
            _ => return Ok(false),
        }

        self.group.remove_member(member_id).await?;
        self.store.delete_if_warned(member_id, cycle)?;
        Ok(true)
    }

    /// Follow-ups owed to members persisted as `Warned`, grouped by cycle.
    ///
    /// Used at startup so a restart inside a grace window does not drop the
    /// pending recheck.
    pub fn pending_follow_ups(&self) -> Result<Vec<GraceFollowUp>, MemberDbError> {
        let mut cycles: BTreeMap<(DateTime<Utc>, DateTime<Utc>), Vec<String>> = BTreeMap::new();

        for member in self.store.get_all()? {
            if let MemberState::Warned {
                warned_at,
                grace_deadline,
            } = member.state
            {
                cycles
                    .entry((warned_at, grace_deadline))
                    .or_default()
                    .push(member.member_id);
            }
        }

        Ok(cycles
            .into_iter()
            .map(|((cycle_started_at, deadline), members)| GraceFollowUp {
                cycle_id: Uuid::new_v4(),
                cycle_started_at,
                deadline,
                members,
            })
            .collect())
    }
}
