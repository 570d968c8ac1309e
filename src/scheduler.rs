// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Audit Scheduler
//!
//! Background task that fires the membership audit once a day at a fixed
//! UTC time and runs each audit's grace-period follow-up when it falls due.
//!
//! ## Strategy
//!
//! 1. On start, follow-ups owed to members persisted as `Warned` are
//!    re-spawned; those whose deadline already passed run immediately.
//! 2. The loop sleeps until the next `daily_at`, runs the audit, and spawns
//!    the audit's follow-up as an independent task. Follow-ups never block
//!    the next audit and audits never wait for follow-ups.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`. A follow-up cancelled by
//! shutdown is not lost: the warned state is on disk and step 1 picks it up
//! at the next start.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::blockchain::BalanceOracle;
use crate::group::GroupControl;
use crate::lifecycle::{GraceFollowUp, MembershipLifecycle, RecheckReport};
use crate::storage::MembershipStore;

/// Default time of day (UTC) for the audit.
pub const DEFAULT_AUDIT_TIME: &str = "02:00";

/// Next occurrence of `at` strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Time left until `deadline`, zero if it already passed.
fn until(deadline: DateTime<Utc>) -> std::time::Duration {
    (deadline - Utc::now()).to_std().unwrap_or_default()
}

/// Daily audit driver.
pub struct AuditScheduler<O, G, S> {
    lifecycle: Arc<MembershipLifecycle<O, G, S>>,
    daily_at: NaiveTime,
}

impl<O, G, S> AuditScheduler<O, G, S>
where
    O: BalanceOracle + 'static,
    G: GroupControl + 'static,
    S: MembershipStore + 'static,
{
    pub fn new(lifecycle: Arc<MembershipLifecycle<O, G, S>>, daily_at: NaiveTime) -> Self {
        Self {
            lifecycle,
            daily_at,
        }
    }

    /// Run the scheduler loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(scheduler.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(daily_at = %self.daily_at, "Audit scheduler starting");

        self.resume_pending(&shutdown);

        loop {
            let now = Utc::now();
            let next = next_daily_run(now, self.daily_at);
            info!(next_run = %next, "Next membership audit scheduled");

            tokio::select! {
                _ = tokio::time::sleep(until(next)) => {},
                _ = shutdown.cancelled() => {
                    info!("Audit scheduler shutting down");
                    return;
                }
            }

            let report = self.lifecycle.run_daily_audit().await;
            if let Some(follow_up) = report.follow_up {
                info!(
                    cycle_id = %follow_up.cycle_id,
                    deadline = %follow_up.deadline,
                    members = follow_up.members.len(),
                    "Awaiting final checks for warned members"
                );
                spawn_follow_up(self.lifecycle.clone(), follow_up, shutdown.clone());
            }
        }
    }

    /// Re-spawn follow-ups persisted before the last shutdown.
    fn resume_pending(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<Option<RecheckReport>>> {
        match self.lifecycle.pending_follow_ups() {
            Ok(pending) => pending
                .into_iter()
                .map(|follow_up| {
                    info!(
                        cycle_id = %follow_up.cycle_id,
                        deadline = %follow_up.deadline,
                        members = follow_up.members.len(),
                        "Resuming pending grace-period follow-up"
                    );
                    spawn_follow_up(self.lifecycle.clone(), follow_up, shutdown.clone())
                })
                .collect(),
            Err(e) => {
                error!(error = %e, "Could not load pending follow-ups");
                Vec::new()
            }
        }
    }
}

/// Run `follow_up` once its deadline is reached, unless shut down first.
pub fn spawn_follow_up<O, G, S>(
    lifecycle: Arc<MembershipLifecycle<O, G, S>>,
    follow_up: GraceFollowUp,
    shutdown: CancellationToken,
) -> JoinHandle<Option<RecheckReport>>
where
    O: BalanceOracle + 'static,
    G: GroupControl + 'static,
    S: MembershipStore + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(until(follow_up.deadline)) => {
                Some(lifecycle.run_follow_up(&follow_up).await)
            }
            _ = shutdown.cancelled() => {
                info!(
                    cycle_id = %follow_up.cycle_id,
                    "Follow-up interrupted by shutdown, will resume on next start"
                );
                None
            }
        }
    })
}
