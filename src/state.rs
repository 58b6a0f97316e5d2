// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Settings;
use crate::gateway::MessageGateway;
use crate::reminders::Clock;
use crate::storage::Database;

/// Shared application state handed to every handler and extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub settings: Arc<Settings>,
    pub gateway: Arc<dyn MessageGateway>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        db: Arc<Database>,
        settings: Settings,
        gateway: Arc<dyn MessageGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
            gateway,
            clock,
        }
    }
}

/// Temp-dir backed state with a recording gateway and a manual clock.
#[cfg(test)]
pub(crate) struct TestContext {
    pub state: AppState,
    pub gateway: Arc<crate::gateway::recording::RecordingGateway>,
    pub clock: Arc<crate::reminders::ManualClock>,
    _dir: tempfile::TempDir,
}

#[cfg(test)]
impl TestContext {
    pub const SECRET: &'static str = "test-bot-secret";

    pub fn new() -> Self {
        let dir = tempfile::TempDir::new().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("test.redb")).unwrap());
        let gateway = Arc::new(crate::gateway::recording::RecordingGateway::new());
        let clock = Arc::new(crate::reminders::ManualClock::new(
            chrono::DateTime::from_timestamp(1_900_000_000, 0).unwrap(),
        ));
        let state = AppState::new(
            db,
            Settings::for_tests(Self::SECRET),
            gateway.clone(),
            clock.clone(),
        );
        Self {
            state,
            gateway,
            clock,
            _dir: dir,
        }
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Fresh signed initData for `user_id`.
    pub fn init_data_for(&self, user_id: i64) -> String {
        crate::auth::init_data::signed_init_data_for(user_id, self.clock.now(), Self::SECRET)
    }

    /// Register `user_id` as a teacher.
    pub fn teacher(&self, user_id: i64) -> crate::storage::StoredUser {
        let user = crate::storage::StoredUser::new_student(user_id, self.clock.now());
        self.db().insert_user_if_absent(&user).unwrap();
        self.db()
            .update_user_role(user_id, crate::auth::Role::Teacher)
            .unwrap()
    }

    /// Register `user_id` as a student.
    pub fn student(&self, user_id: i64) -> crate::storage::StoredUser {
        let user = crate::storage::StoredUser::new_student(user_id, self.clock.now());
        self.db().insert_user_if_absent(&user).unwrap().0
    }
}
