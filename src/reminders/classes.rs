// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reminders for upcoming classes.
//!
//! Schedule items repeat weekly, so reminders are tracked per dated
//! occurrence: `(schedule item, class start)`. An occurrence is due from
//! `start - lead` until the class starts. Only classes with a meeting link
//! are reminded.
//!
//! Delivery follows the homework flow: claim the occurrence, deliver to every
//! active student of an active group, then compare-and-set it sent.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::dispatcher::{DeliverySummary, DispatchError, DispatchOutcome};
use super::messages::{class_reminder_text, CLASS_REMINDER_BUTTON};
use crate::gateway::{MessageGateway, WebAppButton};
use crate::storage::{ClaimOutcome, Database, DbError, DbResult, StoredScheduleItem};

/// Classes further out than this many days are never scanned.
const MAX_SCAN_DAYS: usize = 8;

/// One dated class of a weekly schedule item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOccurrence {
    pub item: StoredScheduleItem,
    pub starts_at: DateTime<Utc>,
}

/// Enumerates class occurrences whose reminder is due and unsent.
pub struct ClassScanner {
    db: Arc<Database>,
    lead: Duration,
}

impl ClassScanner {
    pub fn new(db: Arc<Database>, lead: Duration) -> Self {
        Self { db, lead }
    }

    /// Occurrences with `start - lead <= now < start`, earliest first.
    pub fn scan(&self, now: DateTime<Utc>) -> DbResult<Vec<ClassOccurrence>> {
        let horizon = now
            .checked_add_signed(self.lead)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
            .date_naive();
        let dates: Vec<_> = now
            .date_naive()
            .iter_days()
            .take_while(|date| *date <= horizon)
            .take(MAX_SCAN_DAYS)
            .collect();

        let mut due = Vec::new();
        for item in self.db.list_schedule_items()? {
            if item.meeting_link.is_none() {
                continue;
            }
            for date in &dates {
                let Some(starts_at) = item.occurrence_on(*date) else {
                    continue;
                };
                let opens = starts_at
                    .checked_sub_signed(self.lead)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                if opens <= now
                    && now < starts_at
                    && !self.db.is_class_reminder_sent(item.id, starts_at)?
                {
                    due.push(ClassOccurrence {
                        item: item.clone(),
                        starts_at,
                    });
                }
            }
        }

        due.sort_by_key(|occurrence| (occurrence.starts_at, occurrence.item.id));
        Ok(due)
    }
}

pub struct ClassReminderDispatcher {
    db: Arc<Database>,
    gateway: Arc<dyn MessageGateway>,
    claim_lease: Duration,
    lead: Duration,
    web_app_url: Option<String>,
}

impl ClassReminderDispatcher {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn MessageGateway>,
        claim_lease: Duration,
        lead: Duration,
    ) -> Self {
        Self {
            db,
            gateway,
            claim_lease,
            lead,
            web_app_url: None,
        }
    }

    /// Attach a button opening the Mini App to every reminder.
    pub fn with_web_app_url(mut self, web_app_url: Option<String>) -> Self {
        self.web_app_url = web_app_url;
        self
    }

    pub async fn dispatch(
        &self,
        occurrence: &ClassOccurrence,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let schedule_id = occurrence.item.id;
        let starts_at = occurrence.starts_at;
        let expires_at = now
            .checked_add_signed(self.claim_lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let claim = match self
            .db
            .claim_class_reminder(schedule_id, starts_at, now, expires_at)
            .map_err(|e| match e {
                DbError::NotFound(_) => DispatchError::ScheduleItemNotFound(schedule_id),
                other => DispatchError::Storage(other),
            })? {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::AlreadySent => return Err(DispatchError::RaceLost(schedule_id)),
            ClaimOutcome::Held { expires_at } => {
                debug!(schedule_id, %starts_at, %expires_at, "Class reminder lease held elsewhere");
                return Err(DispatchError::RaceLost(schedule_id));
            }
        };

        let summary = match self.deliver(occurrence).await {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                self.db
                    .release_class_reminder_claim(schedule_id, starts_at, claim.token)?;
                info!(
                    schedule_id,
                    group_id = occurrence.item.group_id,
                    "Group paused, class reminder skipped"
                );
                return Ok(DispatchOutcome::GroupPaused);
            }
            Err(e) => {
                if let Err(release_err) =
                    self.db
                        .release_class_reminder_claim(schedule_id, starts_at, claim.token)
                {
                    warn!(
                        schedule_id,
                        error = %release_err,
                        "Failed to release class reminder lease"
                    );
                }
                return Err(e);
            }
        };

        if !self
            .db
            .complete_class_reminder(schedule_id, starts_at, claim.token)?
        {
            warn!(schedule_id, %starts_at, "Class reminder lease lost before marking sent");
            return Err(DispatchError::RaceLost(schedule_id));
        }

        info!(
            schedule_id,
            group_id = occurrence.item.group_id,
            %starts_at,
            delivered = summary.delivered,
            failed = summary.failed,
            "Class reminder sent"
        );
        Ok(DispatchOutcome::Sent(summary))
    }

    async fn deliver(
        &self,
        occurrence: &ClassOccurrence,
    ) -> Result<Option<DeliverySummary>, DispatchError> {
        let item = &occurrence.item;
        let group = self
            .db
            .get_group(item.group_id)?
            .ok_or(DispatchError::GroupNotFound(item.group_id))?;
        if !group.active {
            return Ok(None);
        }

        let button = self.web_app_url.as_ref().map(|url| WebAppButton {
            text: CLASS_REMINDER_BUTTON.to_string(),
            url: url.clone(),
        });

        let mut summary = DeliverySummary::default();
        for student_id in self.db.list_member_ids(group.id)? {
            let student = match self.db.get_user(student_id)? {
                Some(student) if student.active => student,
                _ => continue,
            };

            let text = class_reminder_text(
                &group,
                item,
                occurrence.starts_at,
                &student.timezone,
                self.lead,
            );
            let result = match &button {
                Some(button) => self.gateway.send_with_button(student_id, &text, button).await,
                None => self.gateway.send(student_id, &text).await,
            };
            match result {
                Ok(()) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    warn!(
                        schedule_id = item.id,
                        student_id,
                        error = %e,
                        "Class reminder delivery failed"
                    );
                }
            }
        }

        Ok(Some(summary))
    }
}
