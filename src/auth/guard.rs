// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request authentication: verify the claim, then resolve the user.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::error::AuthError;
use super::init_data::verify_init_data;
use super::resolver::{resolve_identity, ResolvedUser};
use crate::config::AuthSettings;
use crate::storage::Database;

/// Authenticate a raw initData string.
///
/// No user is created or loaded unless the signature and freshness checks
/// pass first.
pub fn authenticate(
    db: &Database,
    raw_init_data: &str,
    settings: &AuthSettings,
    now: DateTime<Utc>,
) -> Result<ResolvedUser, AuthError> {
    let verified = verify_init_data(raw_init_data, &settings.bot_secret, settings.max_age, now)
        .inspect_err(|e| warn!(error_code = e.error_code(), "initData verification failed"))?;
    resolve_identity(db, &verified, now)
}
