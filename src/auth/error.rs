// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::DbError;

/// Authentication error type.
///
/// `MalformedClaim`, `SignatureMismatch` and `ClaimExpired` come from
/// initData verification; `UserInactive` from identity resolution. All of
/// them are terminal for the request.
#[derive(Debug)]
pub enum AuthError {
    /// No initData header on the request
    MissingInitData,
    /// initData could not be parsed, or lacks `hash`, `auth_date` or a user id
    MalformedClaim,
    /// initData signature does not match the shared secret
    SignatureMismatch,
    /// initData is older than the freshness window
    ClaimExpired,
    /// The resolved user account is deactivated
    UserInactive,
    /// The user's role does not allow this operation
    InsufficientRole,
    /// Internal error (storage failure)
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingInitData => "missing_init_data",
            AuthError::MalformedClaim => "malformed_claim",
            AuthError::SignatureMismatch => "signature_mismatch",
            AuthError::ClaimExpired => "claim_expired",
            AuthError::UserInactive => "user_inactive",
            AuthError::InsufficientRole => "insufficient_role",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingInitData
            | AuthError::MalformedClaim
            | AuthError::SignatureMismatch
            | AuthError::ClaimExpired => StatusCode::UNAUTHORIZED,
            AuthError::UserInactive | AuthError::InsufficientRole => StatusCode::FORBIDDEN,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingInitData => write!(f, "X-Telegram-Init-Data header is required"),
            AuthError::MalformedClaim => write!(f, "Init data is malformed"),
            AuthError::SignatureMismatch => write!(f, "Init data signature is invalid"),
            AuthError::ClaimExpired => {
                write!(f, "Init data has expired. Please refresh the page.")
            }
            AuthError::UserInactive => write!(f, "User account is inactive"),
            AuthError::InsufficientRole => {
                write!(f, "Your role does not allow this operation")
            }
            // Storage details stay in the logs.
            AuthError::InternalError(_) => write!(f, "Internal authentication error"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<DbError> for AuthError {
    fn from(e: DbError) -> Self {
        AuthError::InternalError(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::InternalError(detail) = &self {
            tracing::error!(error = %detail, "Authentication failed with internal error");
        }
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_init_data_returns_401() {
        let response = AuthError::MissingInitData.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_init_data");
    }

    #[test]
    fn verification_failures_map_to_401() {
        for err in [
            AuthError::MalformedClaim,
            AuthError::SignatureMismatch,
            AuthError::ClaimExpired,
        ] {
            assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn inactive_user_returns_403() {
        let response = AuthError::UserInactive.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "user_inactive");
    }

    #[test]
    fn internal_error_hides_detail() {
        let err = AuthError::InternalError("redb exploded".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("redb"));
    }
}
