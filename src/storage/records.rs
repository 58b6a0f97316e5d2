// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Records persisted in the database.
//!
//! Records are stored as JSON values inside redb tables. Users are keyed by
//! their external (Telegram) id; groups, homework and schedule items by
//! sequence ids.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Role;

/// Timezone assigned to users until they set one in their profile.
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Application user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    /// Identity on the messaging platform (unique, immutable)
    pub external_id: i64,
    pub role: Role,
    /// IANA timezone name
    pub timezone: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patronymic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    /// A freshly registered user: student, UTC, active.
    pub fn new_student(external_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            external_id,
            role: Role::Student,
            timezone: DEFAULT_TIMEZONE.to_string(),
            active: true,
            first_name: None,
            last_name: None,
            patronymic: None,
            username: None,
            created_at,
        }
    }

    /// Name shown to other users ("Last First Patronymic" or the id).
    pub fn display_name(&self) -> String {
        match (&self.last_name, &self.first_name) {
            (Some(last), Some(first)) => {
                let mut parts = vec![last.as_str(), first.as_str()];
                if let Some(patronymic) = &self.patronymic {
                    parts.push(patronymic);
                }
                parts.join(" ")
            }
            _ => format!("ID: {}", self.external_id),
        }
    }
}

/// Profile fields a user may change about themselves.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub patronymic: Option<String>,
    pub timezone: String,
}

/// A teacher's group of students.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredGroup {
    pub id: u64,
    /// External id of the owning teacher
    pub teacher_id: i64,
    pub name: String,
    pub invite_code: String,
    /// Paused groups receive no reminders
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Lease taken by a dispatcher while it delivers a reminder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderClaim {
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// A homework assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredHomework {
    pub id: u64,
    pub group_id: u64,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Flips false -> true exactly once, when the reminder is dispatched
    pub reminder_sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_claim: Option<ReminderClaim>,
}

/// Input for creating homework.
#[derive(Debug, Clone)]
pub struct NewHomework {
    pub group_id: u64,
    pub description: String,
    pub deadline: DateTime<Utc>,
}

/// Day a weekly class repeats on.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn weekday(self) -> Weekday {
        match self {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// A weekly class slot of a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredScheduleItem {
    pub id: u64,
    pub group_id: u64,
    pub day_of_week: DayOfWeek,
    /// Start time of day, UTC
    pub time_at: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredScheduleItem {
    /// Start instant of the class on `date`, if it repeats on that weekday.
    pub fn occurrence_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        (date.weekday() == self.day_of_week.weekday())
            .then(|| date.and_time(self.time_at).and_utc())
    }
}

/// Input for adding a class to a group's schedule.
#[derive(Debug, Clone)]
pub struct NewScheduleItem {
    pub group_id: u64,
    pub day_of_week: DayOfWeek,
    pub time_at: NaiveTime,
    pub duration_minutes: Option<u32>,
    pub meeting_link: Option<String>,
}

/// Reminder state of one dated class occurrence.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassReminderState {
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<ReminderClaim>,
}

/// Result of trying to take the reminder lease for a homework item or a
/// class occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The lease is ours until `expires_at`.
    Claimed(ReminderClaim),
    /// The reminder was already sent.
    AlreadySent,
    /// Another dispatcher holds an unexpired lease.
    Held { expires_at: DateTime<Utc> },
}
