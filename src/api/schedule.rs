// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Weekly class schedule of a group.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::groups::owned_group;
use crate::{
    auth::{Auth, TeacherOnly},
    error::ApiError,
    models::{CreateScheduleRequest, HomeworkResponse, ScheduleResponse, UserScheduleResponse},
    state::AppState,
    storage::NewScheduleItem,
};

/// Add a class to a group's weekly schedule.
#[utoipa::path(
    post,
    path = "/api/v1/schedule",
    tag = "Schedule",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, body = ScheduleResponse),
        (status = 403, description = "Caller is not the group's teacher"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn create_schedule_item(
    State(state): State<AppState>,
    TeacherOnly(teacher): TeacherOnly,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleResponse>), ApiError> {
    owned_group(&state, request.group_id, &teacher)?;

    let meeting_link = request
        .meeting_link
        .map(|link| link.trim().to_string())
        .filter(|link| !link.is_empty());
    let item = state.db.create_schedule_item(
        NewScheduleItem {
            group_id: request.group_id,
            day_of_week: request.day_of_week,
            time_at: request.time_at,
            duration_minutes: request.duration_minutes,
            meeting_link,
        },
        state.clock.now(),
    )?;
    info!(
        schedule_id = item.id,
        group_id = item.group_id,
        day = ?item.day_of_week,
        time_at = %item.time_at,
        "Schedule item created"
    );

    Ok((StatusCode::CREATED, Json(ScheduleResponse::from(item))))
}

/// Remove a class from the schedule.
#[utoipa::path(
    delete,
    path = "/api/v1/schedule/{schedule_id}",
    tag = "Schedule",
    params(
        ("schedule_id" = u64, Path, description = "Schedule item identifier"),
        ("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Caller is not the group's teacher"),
        (status = 404, description = "Schedule item not found")
    )
)]
pub async fn delete_schedule_item(
    State(state): State<AppState>,
    TeacherOnly(teacher): TeacherOnly,
    Path(schedule_id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    let item = state
        .db
        .get_schedule_item(schedule_id)?
        .ok_or_else(|| ApiError::not_found("Schedule item not found"))?;
    owned_group(&state, item.group_id, &teacher)?;

    if !state.db.delete_schedule_item(schedule_id)? {
        return Err(ApiError::not_found("Schedule item not found"));
    }
    info!(schedule_id, group_id = item.group_id, "Schedule item deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Classes and open homework across every group of the caller.
#[utoipa::path(
    get,
    path = "/api/v1/user/schedule",
    tag = "User",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    responses((status = 200, body = UserScheduleResponse))
)]
pub async fn user_schedule(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<UserScheduleResponse>, ApiError> {
    let now = state.clock.now();
    let mut schedules = Vec::new();
    let mut active_homework = Vec::new();

    for group in state.db.list_groups_for_user(user.external_id)? {
        schedules.extend(
            state
                .db
                .list_schedule_for_group(group.id)?
                .into_iter()
                .map(ScheduleResponse::from),
        );

        let is_owner = group.teacher_id == user.external_id;
        for homework in state.db.list_homework_for_group(group.id)? {
            if homework.deadline <= now {
                continue;
            }
            let completed = if is_owner {
                None
            } else {
                Some(state.db.is_homework_completed(homework.id, user.external_id)?)
            };
            active_homework.push(HomeworkResponse::new(homework, completed));
        }
    }
    schedules.sort_by_key(|s| (s.day_of_week, s.time_at, s.id));
    active_homework.sort_by_key(|h| (h.deadline, h.id));

    Ok(Json(UserScheduleResponse {
        schedules,
        active_homework,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::Clock;
    use crate::state::TestContext;
    use crate::storage::{DayOfWeek, NewHomework};
    use chrono::{Duration, NaiveTime};

    fn setup(ctx: &TestContext) -> u64 {
        ctx.teacher(1);
        let group = ctx.db().create_group(1, "Physics", ctx.clock.now()).unwrap();
        ctx.student(2);
        ctx.db().add_member(group.id, 2, ctx.clock.now()).unwrap();
        group.id
    }

    fn request(group_id: u64, day: DayOfWeek, hour: u32) -> CreateScheduleRequest {
        CreateScheduleRequest {
            group_id,
            day_of_week: day,
            time_at: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            duration_minutes: Some(45),
            meeting_link: Some("  https://meet.example/phys  ".to_string()),
        }
    }

    #[tokio::test]
    async fn teacher_adds_and_removes_a_class() {
        let ctx = TestContext::new();
        let group_id = setup(&ctx);
        let teacher = ctx.db().get_user(1).unwrap().unwrap();

        let (status, Json(item)) = create_schedule_item(
            State(ctx.state.clone()),
            TeacherOnly(teacher.clone()),
            Json(request(group_id, DayOfWeek::Tuesday, 9)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(item.meeting_link.as_deref(), Some("https://meet.example/phys"));

        let status = delete_schedule_item(
            State(ctx.state.clone()),
            TeacherOnly(teacher.clone()),
            Path(item.id),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(ctx.db().get_schedule_item(item.id).unwrap().is_none());

        let err =
            delete_schedule_item(State(ctx.state.clone()), TeacherOnly(teacher), Path(item.id))
                .await
                .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_group_teacher_manages_schedule() {
        let ctx = TestContext::new();
        let group_id = setup(&ctx);
        let stranger = ctx.teacher(9);

        let err = create_schedule_item(
            State(ctx.state.clone()),
            TeacherOnly(stranger.clone()),
            Json(request(group_id, DayOfWeek::Monday, 10)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = create_schedule_item(
            State(ctx.state.clone()),
            TeacherOnly(stranger.clone()),
            Json(request(999, DayOfWeek::Monday, 10)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let (_, Json(item)) = create_schedule_item(
            State(ctx.state.clone()),
            TeacherOnly(ctx.db().get_user(1).unwrap().unwrap()),
            Json(request(group_id, DayOfWeek::Monday, 10)),
        )
        .await
        .unwrap();
        let err =
            delete_schedule_item(State(ctx.state.clone()), TeacherOnly(stranger), Path(item.id))
                .await
                .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert!(ctx.db().get_schedule_item(item.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn user_schedule_lists_classes_and_open_homework() {
        let ctx = TestContext::new();
        let group_id = setup(&ctx);
        let now = ctx.clock.now();
        for (day, hour) in [
            (DayOfWeek::Friday, 8),
            (DayOfWeek::Monday, 17),
            (DayOfWeek::Monday, 9),
        ] {
            ctx.db()
                .create_schedule_item(
                    NewScheduleItem {
                        group_id,
                        day_of_week: day,
                        time_at: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                        duration_minutes: None,
                        meeting_link: None,
                    },
                    now,
                )
                .unwrap();
        }
        for (description, offset) in [("open", 2), ("closed", -2)] {
            ctx.db()
                .create_homework(
                    NewHomework {
                        group_id,
                        description: description.to_string(),
                        deadline: now + Duration::hours(offset),
                    },
                    now,
                )
                .unwrap();
        }

        let student = ctx.db().get_user(2).unwrap().unwrap();
        let Json(schedule) = user_schedule(State(ctx.state.clone()), Auth(student)).await.unwrap();
        let slots: Vec<(DayOfWeek, u32)> = schedule
            .schedules
            .iter()
            .map(|s| (s.day_of_week, chrono::Timelike::hour(&s.time_at)))
            .collect();
        assert_eq!(
            slots,
            vec![
                (DayOfWeek::Monday, 9),
                (DayOfWeek::Monday, 17),
                (DayOfWeek::Friday, 8)
            ]
        );
        assert_eq!(schedule.active_homework.len(), 1);
        assert_eq!(schedule.active_homework[0].description, "open");
        assert_eq!(schedule.active_homework[0].completed, Some(false));

        let outsider = ctx.student(30);
        let Json(empty) = user_schedule(State(ctx.state.clone()), Auth(outsider)).await.unwrap();
        assert!(empty.schedules.is_empty());
        assert!(empty.active_homework.is_empty());
    }
}
