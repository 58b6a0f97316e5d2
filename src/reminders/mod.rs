// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Deadline Reminders
//!
//! Once per interval the scheduler asks the scanner for homework due within
//! the lookahead window and hands each item to the dispatcher, which delivers
//! one message per student and marks the item so it is never reminded twice.
//! Upcoming classes go through the same claim-deliver-mark flow, keyed by
//! their dated occurrence.
//!
//! Deadlines are compared as UTC instants; timezones only affect how the
//! deadline is written in the message.

pub mod classes;
pub mod clock;
pub mod dispatcher;
pub mod messages;
pub mod notify;
pub mod scanner;
pub mod scheduler;

pub use classes::{ClassOccurrence, ClassReminderDispatcher, ClassScanner};
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatcher::{DeliverySummary, DispatchError, DispatchOutcome, ReminderDispatcher};
pub use notify::notify_new_homework;
pub use scanner::DeadlineScanner;
pub use scheduler::{ReminderScheduler, TickReport};

/// Convert a configured duration for chrono arithmetic, saturating at the
/// largest representable span.
pub(crate) fn to_chrono(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
