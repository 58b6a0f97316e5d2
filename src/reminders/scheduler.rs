// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Reminder Scheduler
//!
//! Background task that scans for due homework and upcoming classes and
//! dispatches their reminders.
//!
//! ## Strategy
//!
//! Every `scan_interval` (default 60 s) the scheduler:
//! 1. Reads `now` from the injected clock.
//! 2. Lists homework with an unsent reminder and a deadline inside
//!    `[now, now + lookahead)`, then class occurrences starting within
//!    `class_lead`.
//! 3. Dispatches each item in order. A failure on one item is logged and
//!    does not stop the others.
//!
//! The `tick_budget` is checked before each item. Once it is spent the
//! remaining items are left untouched and show up again on the next tick.
//! An item already being delivered always runs to completion, so its lease
//! is never abandoned mid-delivery.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, the same pattern as the HTTP
//! server shutdown in `main`.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classes::{ClassOccurrence, ClassReminderDispatcher, ClassScanner};
use super::clock::Clock;
use super::dispatcher::{DispatchError, DispatchOutcome, ReminderDispatcher};
use super::scanner::DeadlineScanner;
use super::to_chrono;
use crate::config::ReminderSettings;
use crate::gateway::MessageGateway;
use crate::storage::{Database, StoredHomework};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Homework items returned by the scan
    pub scanned: usize,
    /// Items marked sent by this tick
    pub sent: usize,
    /// Messages delivered across all sent items
    pub delivered: usize,
    /// Items another dispatcher got to first
    pub race_lost: usize,
    /// Items of paused groups
    pub skipped: usize,
    /// Items that failed with an error
    pub failed: usize,
    /// Class occurrences returned by the scan
    pub classes_scanned: usize,
    /// Class occurrences marked sent by this tick
    pub classes_sent: usize,
    /// The tick ran out of budget
    pub timed_out: bool,
}

impl TickReport {
    fn processed(&self) -> usize {
        self.sent + self.classes_sent + self.race_lost + self.skipped + self.failed
    }

    fn record(&mut self, id: u64, result: Result<DispatchOutcome, DispatchError>) -> bool {
        match result {
            Ok(DispatchOutcome::Sent(summary)) => {
                self.delivered += summary.delivered;
                return true;
            }
            Ok(DispatchOutcome::GroupPaused) => self.skipped += 1,
            Err(DispatchError::RaceLost(_)) => {
                debug!(id, "Reminder already handled elsewhere");
                self.race_lost += 1;
            }
            Err(e) => {
                warn!(id, error = %e, "Reminder dispatch failed");
                self.failed += 1;
            }
        }
        false
    }
}

pub struct ReminderScheduler {
    scanner: DeadlineScanner,
    dispatcher: ReminderDispatcher,
    class_scanner: ClassScanner,
    class_dispatcher: ClassReminderDispatcher,
    clock: Arc<dyn Clock>,
    settings: ReminderSettings,
}

impl ReminderScheduler {
    pub fn new(
        db: Arc<Database>,
        gateway: Arc<dyn MessageGateway>,
        clock: Arc<dyn Clock>,
        settings: ReminderSettings,
    ) -> Self {
        let lookahead = to_chrono(settings.lookahead);
        let class_lead = to_chrono(settings.class_lead);
        let claim_lease = to_chrono(settings.claim_lease);
        Self {
            scanner: DeadlineScanner::new(db.clone(), lookahead),
            dispatcher: ReminderDispatcher::new(
                db.clone(),
                gateway.clone(),
                claim_lease,
                lookahead,
            ),
            class_scanner: ClassScanner::new(db.clone(), class_lead),
            class_dispatcher: ClassReminderDispatcher::new(db, gateway, claim_lease, class_lead),
            clock,
            settings,
        }
    }

    /// Attach a Mini App button to class reminders.
    pub fn with_web_app_url(mut self, web_app_url: Option<String>) -> Self {
        self.class_dispatcher = self.class_dispatcher.with_web_app_url(web_app_url);
        self
    }

    /// Run the scheduler loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(scheduler.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.settings.scan_interval.as_secs(),
            lookahead_secs = self.settings.lookahead.as_secs(),
            class_lead_secs = self.settings.class_lead.as_secs(),
            "Reminder scheduler starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Reminder scheduler shutting down");
                return;
            }

            self.tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.scan_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Reminder scheduler shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one scan-and-dispatch pass.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let deadline = Instant::now() + self.settings.tick_budget;
        let now = self.clock.now();

        let due = self.scanner.scan(now).unwrap_or_else(|e| {
            warn!(error = %e, "Reminder scan failed");
            Vec::new()
        });
        let classes = self.class_scanner.scan(now).unwrap_or_else(|e| {
            warn!(error = %e, "Class reminder scan failed");
            Vec::new()
        });
        report.scanned = due.len();
        report.classes_scanned = classes.len();
        if due.is_empty() && classes.is_empty() {
            return report;
        }

        debug!(
            homework = due.len(),
            classes = classes.len(),
            "Reminder scheduler: dispatching due reminders"
        );

        if self.dispatch_homework(&due, deadline, &mut report).await {
            self.dispatch_classes(&classes, deadline, &mut report).await;
        }

        if report.timed_out {
            warn!(
                budget_ms = self.settings.tick_budget.as_millis() as u64,
                deferred = report.scanned + report.classes_scanned - report.processed(),
                "Reminder tick exceeded its budget; remaining items deferred"
            );
        }

        if report.sent > 0 || report.classes_sent > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                sent = report.sent,
                classes_sent = report.classes_sent,
                delivered = report.delivered,
                race_lost = report.race_lost,
                skipped = report.skipped,
                failed = report.failed,
                "Reminder tick finished"
            );
        }
        report
    }

    /// Returns `false` once the budget is spent.
    async fn dispatch_homework(
        &self,
        due: &[StoredHomework],
        deadline: Instant,
        report: &mut TickReport,
    ) -> bool {
        for homework in due {
            if Instant::now() >= deadline {
                report.timed_out = true;
                return false;
            }
            let result = self.dispatcher.dispatch(homework, self.clock.now()).await;
            if report.record(homework.id, result) {
                report.sent += 1;
            }
        }
        true
    }

    async fn dispatch_classes(
        &self,
        due: &[ClassOccurrence],
        deadline: Instant,
        report: &mut TickReport,
    ) {
        for occurrence in due {
            if Instant::now() >= deadline {
                report.timed_out = true;
                return;
            }
            let result = self
                .class_dispatcher
                .dispatch(occurrence, self.clock.now())
                .await;
            if report.record(occurrence.item.id, result) {
                report.classes_sent += 1;
            }
        }
    }
}
