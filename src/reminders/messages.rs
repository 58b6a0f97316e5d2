// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-facing message texts.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::storage::{StoredGroup, StoredHomework, StoredScheduleItem};

pub const NEW_HOMEWORK_TEXT: &str = "🔔 New homework!\n\nDon't put it off! 👇";
pub const NEW_HOMEWORK_BUTTON: &str = "View assignment";
pub const CLASS_REMINDER_BUTTON: &str = "Open schedule";

/// Deadline reminder, with the deadline shown in the student's timezone.
///
/// Unknown timezone names fall back to UTC.
pub fn reminder_text(
    group: &StoredGroup,
    homework: &StoredHomework,
    timezone: &str,
    lookahead: Duration,
) -> String {
    format!(
        "📚 Homework reminder\n\n\
         Group: {}\n\
         Task: {}\n\
         Deadline: {}\n\
         ⏰ Less than {} left!",
        group.name,
        homework.description,
        local_time(homework.deadline, timezone),
        describe_duration(lookahead),
    )
}

/// Upcoming class reminder, with the start shown in the student's timezone.
pub fn class_reminder_text(
    group: &StoredGroup,
    item: &StoredScheduleItem,
    starts_at: DateTime<Utc>,
    timezone: &str,
    lead: Duration,
) -> String {
    let mut text = format!(
        "⏰ Reminder: class in {}!\n\n\
         Group: {}\n\
         Starts: {}\n\n",
        describe_duration(lead),
        group.name,
        local_time(starts_at, timezone),
    );
    if let Some(link) = &item.meeting_link {
        text.push_str(&format!("Join link:\n{link}\n\n"));
    }
    text.push_str("Check your homework is ready, see you in class! 👋");
    text
}

fn local_time(instant: DateTime<Utc>, timezone: &str) -> String {
    let tz: Tz = timezone.parse().unwrap_or(Tz::UTC);
    instant.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

fn describe_duration(duration: Duration) -> String {
    let minutes = duration.num_minutes();
    match minutes {
        60 => "an hour".to_string(),
        m if m > 0 && m % 60 == 0 => format!("{} hours", m / 60),
        1 => "a minute".to_string(),
        m => format!("{m} minutes"),
    }
}
