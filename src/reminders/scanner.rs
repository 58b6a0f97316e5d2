// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Finds homework whose reminder is due.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::storage::{Database, DbResult, StoredHomework};

/// Enumerates homework with an unsent reminder and a deadline inside
/// `[now, now + lookahead)`.
///
/// Holds no position between scans: an item keeps showing up until its
/// reminder is marked sent, whether or not another dispatcher holds a lease
/// on it. Deadlines already in the past are never returned.
pub struct DeadlineScanner {
    db: Arc<Database>,
    lookahead: Duration,
}

impl DeadlineScanner {
    pub fn new(db: Arc<Database>, lookahead: Duration) -> Self {
        Self { db, lookahead }
    }

    /// Due items, earliest deadline first.
    pub fn scan(&self, now: DateTime<Utc>) -> DbResult<Vec<StoredHomework>> {
        let until = now
            .checked_add_signed(self.lookahead)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.db.list_due_homework(now, until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NewHomework;
    use tempfile::TempDir;

    fn setup() -> (Arc<Database>, u64, TempDir) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("test.redb")).unwrap());
        let group = db.create_group(1, "Algebra", Utc::now()).unwrap();
        (db, group.id, dir)
    }

    fn add(db: &Database, group_id: u64, deadline: DateTime<Utc>) -> u64 {
        db.create_homework(
            NewHomework {
                group_id,
                description: "Exercises".to_string(),
                deadline,
            },
            Utc::now(),
        )
        .unwrap()
        .id
    }

    #[test]
    fn returns_only_items_inside_window() {
        let (db, group_id, _dir) = setup();
        let now = Utc::now();

        let soon = add(&db, group_id, now + Duration::minutes(30));
        let _past = add(&db, group_id, now - Duration::minutes(5));
        let _later = add(&db, group_id, now + Duration::hours(2));
        let _edge = add(&db, group_id, now + Duration::hours(1));

        let scanner = DeadlineScanner::new(db, Duration::hours(1));
        let due: Vec<u64> = scanner.scan(now).unwrap().iter().map(|h| h.id).collect();
        assert_eq!(due, vec![soon]);
    }

    #[test]
    fn deadline_equal_to_now_is_included() {
        let (db, group_id, _dir) = setup();
        let now = Utc::now();
        let id = add(&db, group_id, now);

        let scanner = DeadlineScanner::new(db, Duration::hours(1));
        assert_eq!(scanner.scan(now).unwrap()[0].id, id);
    }

    #[test]
    fn leased_items_are_still_returned() {
        let (db, group_id, _dir) = setup();
        let now = Utc::now();
        let id = add(&db, group_id, now + Duration::minutes(10));
        db.claim_reminder(id, now, now + Duration::seconds(45)).unwrap();

        let scanner = DeadlineScanner::new(db, Duration::hours(1));
        assert_eq!(scanner.scan(now).unwrap().len(), 1);
    }

    #[test]
    fn sent_items_are_not_returned() {
        let (db, group_id, _dir) = setup();
        let now = Utc::now();
        let id = add(&db, group_id, now + Duration::minutes(10));
        let claim = match db.claim_reminder(id, now, now + Duration::seconds(45)).unwrap() {
            crate::storage::ClaimOutcome::Claimed(c) => c,
            other => panic!("unexpected {other:?}"),
        };
        assert!(db.complete_reminder(id, claim.token).unwrap());

        let scanner = DeadlineScanner::new(db, Duration::hours(1));
        assert!(scanner.scan(now).unwrap().is_empty());
    }
}
