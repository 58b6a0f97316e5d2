// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Delivers one homework reminder and marks it sent.
//!
//! ## Exclusivity
//!
//! 1. **Claim**: a conditional write takes a short lease on the item. It
//!    fails when the reminder is already sent or another dispatcher holds an
//!    unexpired lease; the loser delivers nothing.
//! 2. **Deliver**: one message per active student of the group. Individual
//!    failures are logged and never retried.
//! 3. **Mark**: compare-and-set `reminder_sent` false -> true, conditioned on
//!    our lease token.
//!
//! A dispatcher that dies between claim and mark leaves a lease that
//! expires; the item is picked up again on a later tick if it is still
//! inside the window.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::messages::reminder_text;
use crate::gateway::MessageGateway;
use crate::storage::{ClaimOutcome, Database, DbError, StoredHomework};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Another dispatcher claimed or marked the item first. Benign.
    #[error("reminder {0} was handled by another dispatcher")]
    RaceLost(u64),

    #[error("homework {0} not found")]
    HomeworkNotFound(u64),

    #[error("schedule item {0} not found")]
    ScheduleItemNotFound(u64),

    #[error("group {0} not found")]
    GroupNotFound(u64),

    #[error(transparent)]
    Storage(#[from] DbError),
}

/// Per-item delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Delivery was attempted and the item is now marked sent.
    Sent(DeliverySummary),
    /// The group is paused; the item stays unsent.
    GroupPaused,
}

pub struct ReminderDispatcher {
    db: Arc<Database>,
    gateway: Arc<dyn MessageGateway>,
    claim_lease: Duration,
    lookahead: Duration,
}

impl ReminderDispatcher {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn MessageGateway>,
        claim_lease: Duration,
        lookahead: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            claim_lease,
            lookahead,
        }
    }

    /// Dispatch the reminder for `homework`.
    pub async fn dispatch(
        &self,
        homework: &StoredHomework,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let homework_id = homework.id;
        let expires_at = now
            .checked_add_signed(self.claim_lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let claim = match self
            .db
            .claim_reminder(homework_id, now, expires_at)
            .map_err(|e| match e {
                DbError::NotFound(_) => DispatchError::HomeworkNotFound(homework_id),
                other => DispatchError::Storage(other),
            })? {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::AlreadySent => return Err(DispatchError::RaceLost(homework_id)),
            ClaimOutcome::Held { expires_at } => {
                debug!(homework_id, %expires_at, "Reminder lease held elsewhere");
                return Err(DispatchError::RaceLost(homework_id));
            }
        };

        let summary = match self.deliver(homework).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                self.db.release_reminder_claim(homework_id, claim.token)?;
                info!(homework_id, group_id = homework.group_id, "Group paused, reminder skipped");
                return Ok(DispatchOutcome::GroupPaused);
            }
            Err(e) => {
                if let Err(release_err) = self.db.release_reminder_claim(homework_id, claim.token) {
                    warn!(homework_id, error = %release_err, "Failed to release reminder lease");
                }
                return Err(e);
            }
        };

        if !self.db.complete_reminder(homework_id, claim.token)? {
            warn!(homework_id, "Reminder lease lost before marking sent");
            return Err(DispatchError::RaceLost(homework_id));
        }

        info!(
            homework_id,
            group_id = homework.group_id,
            delivered = summary.delivered,
            failed = summary.failed,
            "Homework reminder sent"
        );
        Ok(DispatchOutcome::Sent(summary))
    }

    /// Send the reminder to every active student. `None` when the group is
    /// paused.
    async fn deliver(
        &self,
        homework: &StoredHomework,
    ) -> Result<Option<DeliverySummary>, DispatchError> {
        let group = self
            .db
            .get_group(homework.group_id)?
            .ok_or(DispatchError::GroupNotFound(homework.group_id))?;
        if !group.active {
            return Ok(None);
        }

        let mut summary = DeliverySummary::default();
        for student_id in self.db.list_member_ids(group.id)? {
            let student = match self.db.get_user(student_id)? {
                Some(student) if student.active => student,
                _ => {
                    debug!(
                        homework_id = homework.id,
                        student_id,
                        "Skipping inactive or unknown student"
                    );
                    continue;
                }
            };

            let text = reminder_text(&group, homework, &student.timezone, self.lookahead);
            match self.gateway.send(student_id, &text).await {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        homework_id = homework.id,
                        student_id,
                        error = %e,
                        "Reminder delivery failed"
                    );
                }
            }
        }

        Ok(Some(summary))
    }
}
