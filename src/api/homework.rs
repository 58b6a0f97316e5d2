// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, warn};

use super::groups::owned_group;
use crate::{
    auth::{StudentOnly, TeacherOnly},
    error::ApiError,
    models::{CompleteHomeworkResponse, CreateHomeworkRequest, HomeworkResponse},
    reminders::notify_new_homework,
    state::AppState,
    storage::NewHomework,
};

/// Assign homework to a group and notify its students.
///
/// The deadline reminder needs no scheduling here: the reminder scheduler
/// picks the item up once its deadline enters the lookahead window.
#[utoipa::path(
    post,
    path = "/api/v1/homework",
    tag = "Homework",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    request_body = CreateHomeworkRequest,
    responses(
        (status = 201, body = HomeworkResponse),
        (status = 403, description = "Caller is not the group's teacher"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn create_homework(
    State(state): State<AppState>,
    TeacherOnly(teacher): TeacherOnly,
    Json(request): Json<CreateHomeworkRequest>,
) -> Result<(StatusCode, Json<HomeworkResponse>), ApiError> {
    let description = request.description.trim();
    if description.is_empty() {
        return Err(ApiError::unprocessable("Homework description is required"));
    }
    owned_group(&state, request.group_id, &teacher)?;

    let homework = state.db.create_homework(
        NewHomework {
            group_id: request.group_id,
            description: description.to_string(),
            deadline: request.deadline,
        },
        state.clock.now(),
    )?;
    info!(
        homework_id = homework.id,
        group_id = homework.group_id,
        deadline = %homework.deadline,
        "Homework created"
    );

    let notification = notify_new_homework(
        state.db.clone(),
        state.gateway.clone(),
        homework.clone(),
        state.settings.web_app_url().map(str::to_string),
    );
    tokio::spawn(async move {
        if let Err(e) = notification.await {
            warn!(error = %e, "New homework notification aborted");
        }
    });

    Ok((StatusCode::CREATED, Json(HomeworkResponse::new(homework, None))))
}

/// Mark homework completed by the calling student.
#[utoipa::path(
    post,
    path = "/api/v1/homework/{homework_id}/complete",
    tag = "Homework",
    params(
        ("homework_id" = u64, Path, description = "Homework identifier"),
        ("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")
    ),
    responses(
        (status = 200, body = CompleteHomeworkResponse),
        (status = 400, description = "Already completed"),
        (status = 403, description = "Caller is not a member of the group"),
        (status = 404, description = "Homework not found")
    )
)]
pub async fn complete_homework(
    State(state): State<AppState>,
    StudentOnly(student): StudentOnly,
    Path(homework_id): Path<u64>,
) -> Result<Json<CompleteHomeworkResponse>, ApiError> {
    let homework = state
        .db
        .get_homework(homework_id)?
        .ok_or_else(|| ApiError::not_found("Homework not found"))?;

    if !state.db.is_member(homework.group_id, student.external_id)? {
        return Err(ApiError::forbidden("You are not a member of this group"));
    }

    if !state
        .db
        .complete_homework(homework_id, student.external_id, state.clock.now())?
    {
        return Err(ApiError::bad_request("Homework already completed"));
    }

    info!(homework_id, student_id = student.external_id, "Homework completed");
    Ok(Json(CompleteHomeworkResponse {
        homework_id,
        message: "Homework marked as completed".to_string(),
    }))
}
