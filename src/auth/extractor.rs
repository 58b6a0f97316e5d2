// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated users.
//!
//! Handlers take one of these to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is StoredUser
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{authenticate, AuthError, ResolvedUser, Role};
use crate::state::AppState;
use crate::storage::StoredUser;

/// Header carrying the raw initData string.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

fn init_data_header(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(INIT_DATA_HEADER)
        .ok_or(AuthError::MissingInitData)?
        .to_str()
        .map_err(|_| AuthError::MalformedClaim)
}

fn resolve(parts: &mut Parts, state: &AppState) -> Result<ResolvedUser, AuthError> {
    // A previous extractor in the same request already authenticated.
    if let Some(resolved) = parts.extensions.get::<ResolvedUser>().cloned() {
        return Ok(resolved);
    }

    let raw = init_data_header(parts)?;
    let resolved = authenticate(&state.db, raw, &state.settings.auth, state.clock.now())?;
    parts.extensions.insert(resolved.clone());
    Ok(resolved)
}

/// Extractor for authenticated users.
///
/// Validates the `X-Telegram-Init-Data` header and loads (or registers) the
/// user it names.
pub struct Auth(pub StoredUser);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Auth(resolve(parts, state)?.user))
    }
}

/// Like [`Auth`], but also reports whether the user was just registered.
pub struct Login(pub ResolvedUser);

impl FromRequestParts<AppState> for Login {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Login(resolve(parts, state)?))
    }
}

/// Extractor that requires the teacher role.
pub struct TeacherOnly(pub StoredUser);

impl FromRequestParts<AppState> for TeacherOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if user.role != Role::Teacher {
            return Err(AuthError::InsufficientRole);
        }

        Ok(TeacherOnly(user))
    }
}

/// Extractor that requires the student role.
pub struct StudentOnly(pub StoredUser);

impl FromRequestParts<AppState> for StudentOnly {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Auth(user) = Auth::from_request_parts(parts, state).await?;

        if user.role != Role::Student {
            return Err(AuthError::InsufficientRole);
        }

        Ok(StudentOnly(user))
    }
}
