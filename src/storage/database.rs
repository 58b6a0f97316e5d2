// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded application database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: external_id → serialized StoredUser
//! - `groups`: group_id → serialized StoredGroup
//! - `group_invites`: invite_code → group_id
//! - `group_members`: (group_id, student_id) → joined_at millis
//! - `student_groups`: (student_id, group_id) → () (reverse membership index)
//! - `homework`: homework_id → serialized StoredHomework
//! - `homework_by_deadline`: (deadline millis, homework_id) → () for unsent reminders
//! - `homework_completions`: (homework_id, student_id) → completed_at millis
//! - `schedule`: schedule_id → serialized StoredScheduleItem
//! - `group_schedule`: (group_id, schedule_id) → ()
//! - `class_reminders`: (schedule_id, class start millis) → serialized ClassReminderState
//! - `sequences`: name → last issued id
//!
//! redb runs one write transaction at a time, so every read-check-write
//! sequence inside a single write transaction is atomic across tasks and
//! threads. That is what makes user creation and the reminder flag updates
//! safe without in-process locks.

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;
use redb::{ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use uuid::Uuid;

use super::records::{
    ClaimOutcome, ClassReminderState, NewHomework, NewScheduleItem, ProfileUpdate,
    ReminderClaim, StoredGroup, StoredHomework, StoredScheduleItem, StoredUser,
};
use crate::auth::Role;

// =============================================================================
// Table Definitions
// =============================================================================

const USERS: TableDefinition<i64, &[u8]> = TableDefinition::new("users");
const GROUPS: TableDefinition<u64, &[u8]> = TableDefinition::new("groups");
const GROUP_INVITES: TableDefinition<&str, u64> = TableDefinition::new("group_invites");
const GROUP_MEMBERS: TableDefinition<(u64, i64), i64> = TableDefinition::new("group_members");
const STUDENT_GROUPS: TableDefinition<(i64, u64), ()> = TableDefinition::new("student_groups");
const HOMEWORK: TableDefinition<u64, &[u8]> = TableDefinition::new("homework");

/// Only homework whose reminder is still pending is indexed here.
const HOMEWORK_BY_DEADLINE: TableDefinition<(i64, u64), ()> =
    TableDefinition::new("homework_by_deadline");

const HOMEWORK_COMPLETIONS: TableDefinition<(u64, i64), i64> =
    TableDefinition::new("homework_completions");
const SCHEDULE: TableDefinition<u64, &[u8]> = TableDefinition::new("schedule");
const GROUP_SCHEDULE: TableDefinition<(u64, u64), ()> = TableDefinition::new("group_schedule");
const CLASS_REMINDERS: TableDefinition<(u64, i64), &[u8]> =
    TableDefinition::new("class_reminders");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const GROUP_SEQUENCE: &str = "groups";
const HOMEWORK_SEQUENCE: &str = "homework";
const SCHEDULE_SEQUENCE: &str = "schedule";

const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_CODE_LEN: usize = 8;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Record Helpers
// =============================================================================

fn read_user(
    table: &impl ReadableTable<i64, &'static [u8]>,
    id: i64,
) -> DbResult<Option<StoredUser>> {
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_group(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> DbResult<Option<StoredGroup>> {
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_homework(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> DbResult<Option<StoredHomework>> {
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_schedule_item(
    table: &impl ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> DbResult<Option<StoredScheduleItem>> {
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn read_class_reminder(
    table: &impl ReadableTable<(u64, i64), &'static [u8]>,
    key: (u64, i64),
) -> DbResult<ClassReminderState> {
    match table.get(key)? {
        Some(value) => Ok(serde_json::from_slice(value.value())?),
        None => Ok(ClassReminderState::default()),
    }
}

/// Issue the next id of a named sequence inside an open write transaction.
fn next_id(write_txn: &WriteTransaction, sequence: &str) -> DbResult<u64> {
    let mut table = write_txn.open_table(SEQUENCES)?;
    let current = table.get(sequence)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| INVITE_CODE_ALPHABET[rng.gen_range(0..INVITE_CODE_ALPHABET.len())] as char)
        .collect()
}

// =============================================================================
// Database
// =============================================================================

/// Embedded ACID application database.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> DbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(GROUPS)?;
            let _ = write_txn.open_table(GROUP_INVITES)?;
            let _ = write_txn.open_table(GROUP_MEMBERS)?;
            let _ = write_txn.open_table(STUDENT_GROUPS)?;
            let _ = write_txn.open_table(HOMEWORK)?;
            let _ = write_txn.open_table(HOMEWORK_BY_DEADLINE)?;
            let _ = write_txn.open_table(HOMEWORK_COMPLETIONS)?;
            let _ = write_txn.open_table(SCHEDULE)?;
            let _ = write_txn.open_table(GROUP_SCHEDULE)?;
            let _ = write_txn.open_table(CLASS_REMINDERS)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap read used by the readiness probe.
    pub fn health_check(&self) -> DbResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(USERS)?;
        Ok(())
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Look up a user by external id.
    pub fn get_user(&self, external_id: i64) -> DbResult<Option<StoredUser>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        read_user(&table, external_id)
    }

    /// Insert `user` unless a row with the same external id exists.
    ///
    /// Returns the stored row and whether it was created by this call. The
    /// check and the insert share one write transaction, so concurrent
    /// callers for the same id produce exactly one row.
    pub fn insert_user_if_absent(&self, user: &StoredUser) -> DbResult<(StoredUser, bool)> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(USERS)?;
            match read_user(&table, user.external_id)? {
                Some(existing) => (existing, false),
                None => {
                    let json = serde_json::to_vec(user)?;
                    table.insert(user.external_id, json.as_slice())?;
                    (user.clone(), true)
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    fn update_user(
        &self,
        external_id: i64,
        apply: impl FnOnce(&mut StoredUser),
    ) -> DbResult<StoredUser> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut table = write_txn.open_table(USERS)?;
            let mut user = read_user(&table, external_id)?
                .ok_or_else(|| DbError::NotFound(format!("User {external_id}")))?;
            apply(&mut user);
            let json = serde_json::to_vec(&user)?;
            table.insert(external_id, json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn update_user_role(&self, external_id: i64, role: Role) -> DbResult<StoredUser> {
        self.update_user(external_id, |user| user.role = role)
    }

    /// Apply a profile update. The timezone must already be validated.
    pub fn update_user_profile(
        &self,
        external_id: i64,
        update: ProfileUpdate,
    ) -> DbResult<StoredUser> {
        self.update_user(external_id, |user| {
            user.first_name = Some(update.first_name);
            user.last_name = Some(update.last_name);
            user.patronymic = update.patronymic;
            user.timezone = update.timezone;
        })
    }

    pub fn set_user_active(&self, external_id: i64, active: bool) -> DbResult<StoredUser> {
        self.update_user(external_id, |user| user.active = active)
    }

    // =========================================================================
    // Groups and membership
    // =========================================================================

    /// Create a group owned by `teacher_id` with a fresh unique invite code.
    pub fn create_group(
        &self,
        teacher_id: i64,
        name: &str,
        now: DateTime<Utc>,
    ) -> DbResult<StoredGroup> {
        let write_txn = self.db.begin_write()?;
        let group = {
            let id = next_id(&write_txn, GROUP_SEQUENCE)?;
            let mut invites = write_txn.open_table(GROUP_INVITES)?;

            let invite_code = loop {
                let candidate = generate_invite_code();
                if invites.get(candidate.as_str())?.is_none() {
                    break candidate;
                }
            };

            let group = StoredGroup {
                id,
                teacher_id,
                name: name.to_string(),
                invite_code,
                active: true,
                created_at: now,
            };

            invites.insert(group.invite_code.as_str(), id)?;
            let mut groups = write_txn.open_table(GROUPS)?;
            let json = serde_json::to_vec(&group)?;
            groups.insert(id, json.as_slice())?;
            group
        };
        write_txn.commit()?;
        Ok(group)
    }

    pub fn get_group(&self, group_id: u64) -> DbResult<Option<StoredGroup>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(GROUPS)?;
        read_group(&table, group_id)
    }

    pub fn get_group_by_invite_code(&self, invite_code: &str) -> DbResult<Option<StoredGroup>> {
        let read_txn = self.db.begin_read()?;
        let invites = read_txn.open_table(GROUP_INVITES)?;
        let group_id = match invites.get(invite_code)? {
            Some(v) => v.value(),
            None => return Ok(None),
        };
        let groups = read_txn.open_table(GROUPS)?;
        read_group(&groups, group_id)
    }

    /// Pause or resume a group.
    pub fn set_group_active(&self, group_id: u64, active: bool) -> DbResult<StoredGroup> {
        let write_txn = self.db.begin_write()?;
        let group = {
            let mut table = write_txn.open_table(GROUPS)?;
            let mut group = read_group(&table, group_id)?
                .ok_or_else(|| DbError::NotFound(format!("Group {group_id}")))?;
            group.active = active;
            let json = serde_json::to_vec(&group)?;
            table.insert(group_id, json.as_slice())?;
            group
        };
        write_txn.commit()?;
        Ok(group)
    }

    /// Groups the user teaches or has joined, ordered by id.
    pub fn list_groups_for_user(&self, external_id: i64) -> DbResult<Vec<StoredGroup>> {
        let read_txn = self.db.begin_read()?;
        let groups = read_txn.open_table(GROUPS)?;
        let student_groups = read_txn.open_table(STUDENT_GROUPS)?;

        let mut result = Vec::new();
        for entry in groups.iter()? {
            let (_, value) = entry?;
            let group: StoredGroup = serde_json::from_slice(value.value())?;
            if group.teacher_id == external_id {
                result.push(group);
            }
        }

        for entry in student_groups.range((external_id, 0u64)..=(external_id, u64::MAX))? {
            let (key, _) = entry?;
            let (_, group_id) = key.value();
            if result.iter().any(|g| g.id == group_id) {
                continue;
            }
            if let Some(group) = read_group(&groups, group_id)? {
                result.push(group);
            }
        }

        result.sort_by_key(|g| g.id);
        Ok(result)
    }

    /// Add a student to a group. Returns `false` if they were already a member.
    pub fn add_member(
        &self,
        group_id: u64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let added = {
            let groups = write_txn.open_table(GROUPS)?;
            if read_group(&groups, group_id)?.is_none() {
                return Err(DbError::NotFound(format!("Group {group_id}")));
            }

            let mut members = write_txn.open_table(GROUP_MEMBERS)?;
            if members.get((group_id, student_id))?.is_some() {
                false
            } else {
                members.insert((group_id, student_id), now.timestamp_millis())?;
                let mut reverse = write_txn.open_table(STUDENT_GROUPS)?;
                reverse.insert((student_id, group_id), ())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(added)
    }

    pub fn is_member(&self, group_id: u64, student_id: i64) -> DbResult<bool> {
        let read_txn = self.db.begin_read()?;
        let members = read_txn.open_table(GROUP_MEMBERS)?;
        Ok(members.get((group_id, student_id))?.is_some())
    }

    /// External ids of every student enrolled in the group.
    pub fn list_member_ids(&self, group_id: u64) -> DbResult<Vec<i64>> {
        let read_txn = self.db.begin_read()?;
        let members = read_txn.open_table(GROUP_MEMBERS)?;
        let mut ids = Vec::new();
        for entry in members.range((group_id, i64::MIN)..=(group_id, i64::MAX))? {
            let (key, _) = entry?;
            ids.push(key.value().1);
        }
        Ok(ids)
    }

    // =========================================================================
    // Homework
    // =========================================================================

    pub fn create_homework(
        &self,
        homework: NewHomework,
        now: DateTime<Utc>,
    ) -> DbResult<StoredHomework> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let groups = write_txn.open_table(GROUPS)?;
            if read_group(&groups, homework.group_id)?.is_none() {
                return Err(DbError::NotFound(format!("Group {}", homework.group_id)));
            }

            let id = next_id(&write_txn, HOMEWORK_SEQUENCE)?;
            let stored = StoredHomework {
                id,
                group_id: homework.group_id,
                description: homework.description,
                deadline: homework.deadline,
                created_at: now,
                reminder_sent: false,
                reminder_claim: None,
            };

            let mut table = write_txn.open_table(HOMEWORK)?;
            let json = serde_json::to_vec(&stored)?;
            table.insert(id, json.as_slice())?;

            let mut index = write_txn.open_table(HOMEWORK_BY_DEADLINE)?;
            index.insert((stored.deadline.timestamp_millis(), id), ())?;
            stored
        };
        write_txn.commit()?;
        Ok(stored)
    }

    pub fn get_homework(&self, homework_id: u64) -> DbResult<Option<StoredHomework>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HOMEWORK)?;
        read_homework(&table, homework_id)
    }

    /// All homework of a group, earliest deadline first.
    pub fn list_homework_for_group(&self, group_id: u64) -> DbResult<Vec<StoredHomework>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HOMEWORK)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let homework: StoredHomework = serde_json::from_slice(value.value())?;
            if homework.group_id == group_id {
                result.push(homework);
            }
        }
        result.sort_by_key(|h| (h.deadline, h.id));
        Ok(result)
    }

    /// Homework with `reminder_sent = false` and `from <= deadline < to`,
    /// earliest deadline first.
    ///
    /// The index is keyed by whole milliseconds, so the boundary buckets are
    /// read inclusively and filtered on the exact instant.
    pub fn list_due_homework(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<StoredHomework>> {
        if to <= from {
            return Ok(Vec::new());
        }
        let from_ms = from.timestamp_millis();
        let to_ms = to.timestamp_millis();

        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(HOMEWORK_BY_DEADLINE)?;
        let table = read_txn.open_table(HOMEWORK)?;

        let mut result = Vec::new();
        for entry in index.range((from_ms, 0u64)..=(to_ms, u64::MAX))? {
            let (key, _) = entry?;
            let (_, homework_id) = key.value();
            if let Some(homework) = read_homework(&table, homework_id)? {
                if !homework.reminder_sent && homework.deadline >= from && homework.deadline < to {
                    result.push(homework);
                }
            }
        }
        Ok(result)
    }

    /// Record a student's completion. Returns `false` if already completed.
    pub fn complete_homework(
        &self,
        homework_id: u64,
        student_id: i64,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(HOMEWORK_COMPLETIONS)?;
            if table.get((homework_id, student_id))?.is_some() {
                false
            } else {
                table.insert((homework_id, student_id), now.timestamp_millis())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    pub fn is_homework_completed(&self, homework_id: u64, student_id: i64) -> DbResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HOMEWORK_COMPLETIONS)?;
        Ok(table.get((homework_id, student_id))?.is_some())
    }

    // =========================================================================
    // Reminder flag
    // =========================================================================

    /// Take the delivery lease for a homework reminder.
    ///
    /// Succeeds only while `reminder_sent` is false and no unexpired lease
    /// exists. An expired lease (a dispatcher that died mid-delivery) is
    /// replaced.
    pub fn claim_reminder(
        &self,
        homework_id: u64,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DbResult<ClaimOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut table = write_txn.open_table(HOMEWORK)?;
            let mut homework = read_homework(&table, homework_id)?
                .ok_or_else(|| DbError::NotFound(format!("Homework {homework_id}")))?;

            if homework.reminder_sent {
                ClaimOutcome::AlreadySent
            } else if let Some(held) = homework.reminder_claim.filter(|c| c.expires_at > now) {
                ClaimOutcome::Held {
                    expires_at: held.expires_at,
                }
            } else {
                let claim = ReminderClaim {
                    token: Uuid::new_v4(),
                    expires_at,
                };
                homework.reminder_claim = Some(claim);
                let json = serde_json::to_vec(&homework)?;
                table.insert(homework_id, json.as_slice())?;
                ClaimOutcome::Claimed(claim)
            }
        };

        if matches!(outcome, ClaimOutcome::Claimed(_)) {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }

    /// Drop a lease without marking the reminder sent.
    pub fn release_reminder_claim(&self, homework_id: u64, token: Uuid) -> DbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HOMEWORK)?;
            let mut homework = read_homework(&table, homework_id)?
                .ok_or_else(|| DbError::NotFound(format!("Homework {homework_id}")))?;
            if homework.reminder_claim.map(|c| c.token) == Some(token) {
                homework.reminder_claim = None;
                let json = serde_json::to_vec(&homework)?;
                table.insert(homework_id, json.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Compare-and-set `reminder_sent` from false to true.
    ///
    /// Takes effect only if the flag is still false and the lease identified
    /// by `token` is still the one on record. Returns whether this call
    /// performed the transition.
    pub fn complete_reminder(&self, homework_id: u64, token: Uuid) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let marked = {
            let mut table = write_txn.open_table(HOMEWORK)?;
            let mut homework = read_homework(&table, homework_id)?
                .ok_or_else(|| DbError::NotFound(format!("Homework {homework_id}")))?;

            if homework.reminder_sent || homework.reminder_claim.map(|c| c.token) != Some(token) {
                false
            } else {
                homework.reminder_sent = true;
                homework.reminder_claim = None;
                let json = serde_json::to_vec(&homework)?;
                table.insert(homework_id, json.as_slice())?;

                let mut index = write_txn.open_table(HOMEWORK_BY_DEADLINE)?;
                index.remove((homework.deadline.timestamp_millis(), homework_id))?;
                true
            }
        };

        if marked {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(marked)
    }

    // =========================================================================
    // Class schedule
    // =========================================================================

    pub fn create_schedule_item(
        &self,
        item: NewScheduleItem,
        now: DateTime<Utc>,
    ) -> DbResult<StoredScheduleItem> {
        let write_txn = self.db.begin_write()?;
        let stored = {
            let groups = write_txn.open_table(GROUPS)?;
            if read_group(&groups, item.group_id)?.is_none() {
                return Err(DbError::NotFound(format!("Group {}", item.group_id)));
            }

            let id = next_id(&write_txn, SCHEDULE_SEQUENCE)?;
            let stored = StoredScheduleItem {
                id,
                group_id: item.group_id,
                day_of_week: item.day_of_week,
                time_at: item.time_at,
                duration_minutes: item.duration_minutes,
                meeting_link: item.meeting_link,
                created_at: now,
            };

            let mut table = write_txn.open_table(SCHEDULE)?;
            let json = serde_json::to_vec(&stored)?;
            table.insert(id, json.as_slice())?;

            let mut index = write_txn.open_table(GROUP_SCHEDULE)?;
            index.insert((stored.group_id, id), ())?;
            stored
        };
        write_txn.commit()?;
        Ok(stored)
    }

    pub fn get_schedule_item(&self, schedule_id: u64) -> DbResult<Option<StoredScheduleItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SCHEDULE)?;
        read_schedule_item(&table, schedule_id)
    }

    /// Remove a schedule item and its reminder history. Returns `false` if it
    /// did not exist.
    pub fn delete_schedule_item(&self, schedule_id: u64) -> DbResult<bool> {
        let write_txn = self.db.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(SCHEDULE)?;
            let removed = match table.remove(schedule_id)? {
                Some(value) => Some(serde_json::from_slice::<StoredScheduleItem>(value.value())?),
                None => None,
            };

            match removed {
                Some(item) => {
                    let mut index = write_txn.open_table(GROUP_SCHEDULE)?;
                    index.remove((item.group_id, schedule_id))?;

                    let mut reminders = write_txn.open_table(CLASS_REMINDERS)?;
                    let keys = reminders
                        .range((schedule_id, i64::MIN)..=(schedule_id, i64::MAX))?
                        .map(|entry| entry.map(|(key, _)| key.value()))
                        .collect::<Result<Vec<_>, _>>()?;
                    for key in keys {
                        reminders.remove(key)?;
                    }
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// A group's classes in weekly order.
    pub fn list_schedule_for_group(&self, group_id: u64) -> DbResult<Vec<StoredScheduleItem>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(GROUP_SCHEDULE)?;
        let table = read_txn.open_table(SCHEDULE)?;

        let mut result = Vec::new();
        for entry in index.range((group_id, 0u64)..=(group_id, u64::MAX))? {
            let (key, _) = entry?;
            if let Some(item) = read_schedule_item(&table, key.value().1)? {
                result.push(item);
            }
        }
        result.sort_by_key(|item| (item.day_of_week, item.time_at, item.id));
        Ok(result)
    }

    /// Every schedule item of every group.
    pub fn list_schedule_items(&self) -> DbResult<Vec<StoredScheduleItem>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SCHEDULE)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    // =========================================================================
    // Class reminder flag
    // =========================================================================

    pub fn is_class_reminder_sent(
        &self,
        schedule_id: u64,
        starts_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CLASS_REMINDERS)?;
        Ok(read_class_reminder(&table, (schedule_id, starts_at.timestamp_millis()))?.sent)
    }

    /// Take the delivery lease for the reminder of the class starting at
    /// `starts_at`. Same rules as [`Database::claim_reminder`].
    pub fn claim_class_reminder(
        &self,
        schedule_id: u64,
        starts_at: DateTime<Utc>,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> DbResult<ClaimOutcome> {
        let key = (schedule_id, starts_at.timestamp_millis());
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let items = write_txn.open_table(SCHEDULE)?;
            if read_schedule_item(&items, schedule_id)?.is_none() {
                return Err(DbError::NotFound(format!("Schedule item {schedule_id}")));
            }

            let mut table = write_txn.open_table(CLASS_REMINDERS)?;
            let mut state = read_class_reminder(&table, key)?;
            if state.sent {
                ClaimOutcome::AlreadySent
            } else if let Some(held) = state.claim.filter(|c| c.expires_at > now) {
                ClaimOutcome::Held {
                    expires_at: held.expires_at,
                }
            } else {
                let claim = ReminderClaim {
                    token: Uuid::new_v4(),
                    expires_at,
                };
                state.claim = Some(claim);
                let json = serde_json::to_vec(&state)?;
                table.insert(key, json.as_slice())?;
                ClaimOutcome::Claimed(claim)
            }
        };

        if matches!(outcome, ClaimOutcome::Claimed(_)) {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(outcome)
    }

    pub fn release_class_reminder_claim(
        &self,
        schedule_id: u64,
        starts_at: DateTime<Utc>,
        token: Uuid,
    ) -> DbResult<()> {
        let key = (schedule_id, starts_at.timestamp_millis());
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CLASS_REMINDERS)?;
            let mut state = read_class_reminder(&table, key)?;
            if state.claim.map(|c| c.token) == Some(token) {
                state.claim = None;
                let json = serde_json::to_vec(&state)?;
                table.insert(key, json.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Compare-and-set the occurrence's `sent` flag, conditioned on `token`.
    pub fn complete_class_reminder(
        &self,
        schedule_id: u64,
        starts_at: DateTime<Utc>,
        token: Uuid,
    ) -> DbResult<bool> {
        let key = (schedule_id, starts_at.timestamp_millis());
        let write_txn = self.db.begin_write()?;
        let marked = {
            let mut table = write_txn.open_table(CLASS_REMINDERS)?;
            let mut state = read_class_reminder(&table, key)?;
            if state.sent || state.claim.map(|c| c.token) != Some(token) {
                false
            } else {
                state.sent = true;
                state.claim = None;
                let json = serde_json::to_vec(&state)?;
                table.insert(key, json.as_slice())?;
                true
            }
        };

        if marked {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(marked)
    }
}

// =============================================================================
// Tests
// =============================================================================
