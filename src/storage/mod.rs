// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent storage in a single embedded redb database file under
//! `DATA_DIR`. Every multi-step update runs inside one redb write
//! transaction; redb admits one writer at a time, which is the only
//! serialization point the service relies on.

pub mod database;
pub mod records;

pub use database::{Database, DbError, DbResult};
pub use records::{
    ClaimOutcome, DayOfWeek, NewHomework, NewScheduleItem, ProfileUpdate, ReminderClaim,
    StoredGroup, StoredHomework, StoredScheduleItem, StoredUser, DEFAULT_TIMEZONE,
};
