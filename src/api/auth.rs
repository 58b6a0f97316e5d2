// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, current user and self-service profile endpoints.

use axum::{extract::State, Json};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::{
    auth::{Auth, Login},
    error::ApiError,
    models::{LoginResponse, UpdateProfileRequest, UpdateRoleRequest, UserResponse},
    state::AppState,
    storage::ProfileUpdate,
};

/// Register on first contact, otherwise log in.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    responses(
        (status = 200, body = LoginResponse),
        (status = 401, description = "Missing, malformed, forged or expired initData"),
        (status = 403, description = "User account is inactive")
    )
)]
pub async fn login(Login(resolved): Login) -> Json<LoginResponse> {
    let message = if resolved.created {
        "Registration successful"
    } else {
        "Login successful"
    };
    Json(LoginResponse {
        user: resolved.user.into(),
        is_new_user: resolved.created,
        message: message.to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    responses((status = 200, body = UserResponse))
)]
pub async fn me(Auth(user): Auth) -> Json<UserResponse> {
    Json(user.into())
}

/// Switch between student and teacher.
#[utoipa::path(
    post,
    path = "/api/v1/auth/update-role",
    tag = "Auth",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    request_body = UpdateRoleRequest,
    responses((status = 200, body = UserResponse))
)]
pub async fn update_role(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.db.update_user_role(user.external_id, request.role)?;
    info!(external_id = user.external_id, role = %request.role, "User role updated");
    Ok(Json(updated.into()))
}

/// Set names and timezone. The timezone must be a valid IANA name.
#[utoipa::path(
    post,
    path = "/api/v1/auth/profile",
    tag = "Auth",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, body = UserResponse),
        (status = 400, description = "Unknown timezone"),
        (status = 422, description = "Empty name")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    Auth(user): Auth,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(ApiError::unprocessable("First and last name are required"));
    }

    let timezone = request.timezone.trim();
    if timezone.parse::<Tz>().is_err() {
        warn!(external_id = user.external_id, timezone, "Rejected invalid timezone");
        return Err(ApiError::bad_request(format!(
            "Invalid timezone: {timezone}. Please use a valid timezone like \
             'Europe/Moscow' or 'America/New_York'"
        )));
    }

    let patronymic = request
        .patronymic
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let updated = state.db.update_user_profile(
        user.external_id,
        ProfileUpdate {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            patronymic,
            timezone: timezone.to_string(),
        },
    )?;
    info!(external_id = user.external_id, timezone, "User profile updated");
    Ok(Json(updated.into()))
}
