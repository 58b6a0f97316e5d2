// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Maps a verified claim to an application user.
//!
//! First contact creates the user (student, UTC, active) seeded with the
//! names from the claim. The existence check and the insert share one
//! storage transaction, so two concurrent first requests for the same
//! external id end up with one user.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::error::AuthError;
use super::init_data::VerifiedInitData;
use crate::storage::{Database, StoredUser};

/// Result of identity resolution.
#[derive(Debug, Clone)]
pub struct ResolvedUser {
    pub user: StoredUser,
    /// True when this request registered the user.
    pub created: bool,
}

/// Find or create the user named by a verified claim.
pub fn resolve_identity(
    db: &Database,
    claim: &VerifiedInitData,
    now: DateTime<Utc>,
) -> Result<ResolvedUser, AuthError> {
    let external_id = claim.user.id;

    let (user, created) = match db.get_user(external_id)? {
        Some(existing) => (existing, false),
        None => {
            let mut fresh = StoredUser::new_student(external_id, now);
            fresh.first_name = claim.user.first_name.clone();
            fresh.last_name = claim.user.last_name.clone();
            fresh.username = claim.user.username.clone();
            db.insert_user_if_absent(&fresh)?
        }
    };

    if created {
        info!(external_id, "Registered new user");
    }

    if !user.active {
        warn!(external_id, "Rejected request from inactive user");
        return Err(AuthError::UserInactive);
    }

    Ok(ResolvedUser { user, created })
}
