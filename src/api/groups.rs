// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    auth::{Auth, StudentOnly, TeacherOnly},
    error::ApiError,
    models::{
        CreateGroupRequest, GroupResponse, GroupWithInviteResponse, HomeworkResponse,
        InviteLinkResponse, JoinGroupRequest, JoinGroupResponse, UpdateGroupStatusRequest,
    },
    state::AppState,
    storage::{StoredGroup, StoredUser},
};

/// Load a group and require `user` to be its teacher.
pub(crate) fn owned_group(
    state: &AppState,
    group_id: u64,
    user: &StoredUser,
) -> Result<StoredGroup, ApiError> {
    let group = state
        .db
        .get_group(group_id)?
        .ok_or_else(|| ApiError::not_found("Group not found"))?;
    if group.teacher_id != user.external_id {
        return Err(ApiError::forbidden("You are not the teacher of this group"));
    }
    Ok(group)
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    tag = "Groups",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    request_body = CreateGroupRequest,
    responses(
        (status = 201, body = GroupWithInviteResponse),
        (status = 403, description = "Caller is not a teacher")
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    TeacherOnly(teacher): TeacherOnly,
    Json(request): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<GroupWithInviteResponse>), ApiError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::unprocessable("Group name is required"));
    }

    let group = state
        .db
        .create_group(teacher.external_id, name, state.clock.now())?;
    info!(group_id = group.id, teacher_id = teacher.external_id, "Group created");

    let invite_link = state.settings.invite_link(&group.invite_code);
    let invite_code = group.invite_code.clone();
    Ok((
        StatusCode::CREATED,
        Json(GroupWithInviteResponse {
            group: group.into(),
            invite_code,
            invite_link,
        }),
    ))
}

/// Groups the caller teaches or has joined.
#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    responses((status = 200, body = [GroupResponse]))
)]
pub async fn list_groups(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    let groups = state.db.list_groups_for_user(user.external_id)?;
    Ok(Json(groups.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}/invite-link",
    tag = "Groups",
    params(
        ("group_id" = u64, Path, description = "Group identifier"),
        ("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")
    ),
    responses(
        (status = 200, body = InviteLinkResponse),
        (status = 403, description = "Caller is not the group's teacher"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn get_invite_link(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(group_id): Path<u64>,
) -> Result<Json<InviteLinkResponse>, ApiError> {
    let group = owned_group(&state, group_id, &user)?;
    Ok(Json(InviteLinkResponse {
        group_id: group.id,
        invite_link: state.settings.invite_link(&group.invite_code),
        group_name: group.name,
        invite_code: group.invite_code,
    }))
}

/// Join a group with its invite code. Joining twice is a no-op.
#[utoipa::path(
    post,
    path = "/api/v1/groups/join",
    tag = "Groups",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    request_body = JoinGroupRequest,
    responses(
        (status = 200, body = JoinGroupResponse),
        (status = 404, description = "Unknown invite code")
    )
)]
pub async fn join_group(
    State(state): State<AppState>,
    StudentOnly(student): StudentOnly,
    Json(request): Json<JoinGroupRequest>,
) -> Result<Json<JoinGroupResponse>, ApiError> {
    let code = request.invite_code.trim().to_ascii_uppercase();
    let group = state
        .db
        .get_group_by_invite_code(&code)?
        .ok_or_else(|| ApiError::not_found("Invalid invite code"))?;

    let joined = state
        .db
        .add_member(group.id, student.external_id, state.clock.now())?;
    if joined {
        info!(group_id = group.id, student_id = student.external_id, "Student joined group");
    }

    Ok(Json(JoinGroupResponse {
        group: group.into(),
        joined,
    }))
}

/// Pause or resume a group. Paused groups receive no reminders.
#[utoipa::path(
    post,
    path = "/api/v1/groups/{group_id}/status",
    tag = "Groups",
    params(
        ("group_id" = u64, Path, description = "Group identifier"),
        ("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")
    ),
    request_body = UpdateGroupStatusRequest,
    responses(
        (status = 200, body = GroupResponse),
        (status = 403, description = "Caller is not the group's teacher"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn update_group_status(
    State(state): State<AppState>,
    TeacherOnly(teacher): TeacherOnly,
    Path(group_id): Path<u64>,
    Json(request): Json<UpdateGroupStatusRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    owned_group(&state, group_id, &teacher)?;
    let group = state.db.set_group_active(group_id, request.active)?;
    info!(group_id, active = request.active, "Group status updated");
    Ok(Json(group.into()))
}

/// Homework of a group, earliest deadline first. Students also see whether
/// they completed each item.
#[utoipa::path(
    get,
    path = "/api/v1/groups/{group_id}/homework",
    tag = "Groups",
    params(
        ("group_id" = u64, Path, description = "Group identifier"),
        ("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")
    ),
    responses(
        (status = 200, body = [HomeworkResponse]),
        (status = 403, description = "Caller neither teaches nor belongs to the group"),
        (status = 404, description = "Group not found")
    )
)]
pub async fn list_group_homework(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(group_id): Path<u64>,
) -> Result<Json<Vec<HomeworkResponse>>, ApiError> {
    let group = state
        .db
        .get_group(group_id)?
        .ok_or_else(|| ApiError::not_found("Group not found"))?;

    let is_owner = group.teacher_id == user.external_id;
    if !is_owner && !state.db.is_member(group_id, user.external_id)? {
        return Err(ApiError::forbidden("You are not a member of this group"));
    }

    let mut response = Vec::new();
    for homework in state.db.list_homework_for_group(group_id)? {
        let completed = if is_owner {
            None
        } else {
            Some(state.db.is_homework_completed(homework.id, user.external_id)?)
        };
        response.push(HomeworkResponse::new(homework, completed));
    }
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::Clock;
    use crate::state::TestContext;
    use crate::storage::NewHomework;

    async fn create(ctx: &TestContext, teacher: StoredUser, name: &str) -> GroupWithInviteResponse {
        let (status, Json(group)) = create_group(
            State(ctx.state.clone()),
            TeacherOnly(teacher),
            Json(CreateGroupRequest {
                name: name.to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        group
    }

    #[tokio::test]
    async fn create_group_returns_invite() {
        let ctx = TestContext::new();
        let teacher = ctx.teacher(1);

        let group = create(&ctx, teacher, "  Geometry  ").await;
        assert_eq!(group.group.name, "Geometry");
        assert_eq!(group.invite_code.len(), 8);
        assert!(group
            .invite_link
            .ends_with(&format!("?start=group_{}", group.invite_code)));
    }

    #[tokio::test]
    async fn blank_group_name_is_rejected() {
        let ctx = TestContext::new();
        let err = create_group(
            State(ctx.state.clone()),
            TeacherOnly(ctx.teacher(1)),
            Json(CreateGroupRequest {
                name: "   ".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn join_is_idempotent_and_case_insensitive() {
        let ctx = TestContext::new();
        let group = create(&ctx, ctx.teacher(1), "Geometry").await;
        let student = ctx.student(2);

        let request = JoinGroupRequest {
            invite_code: group.invite_code.to_lowercase(),
        };
        let Json(first) = join_group(
            State(ctx.state.clone()),
            StudentOnly(student.clone()),
            Json(request.clone()),
        )
        .await
        .unwrap();
        assert!(first.joined);

        let Json(second) = join_group(State(ctx.state.clone()), StudentOnly(student), Json(request))
            .await
            .unwrap();
        assert!(!second.joined);
        assert_eq!(ctx.db().list_member_ids(group.group.id).unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn unknown_invite_code_is_not_found() {
        let ctx = TestContext::new();
        let err = join_group(
            State(ctx.state.clone()),
            StudentOnly(ctx.student(2)),
            Json(JoinGroupRequest {
                invite_code: "NOPE0000".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invite_link_is_owner_only() {
        let ctx = TestContext::new();
        let group = create(&ctx, ctx.teacher(1), "Geometry").await;

        let Json(link) = get_invite_link(
            State(ctx.state.clone()),
            Auth(ctx.db().get_user(1).unwrap().unwrap()),
            Path(group.group.id),
        )
        .await
        .unwrap();
        assert_eq!(link.invite_code, group.invite_code);

        let err = get_invite_link(
            State(ctx.state.clone()),
            Auth(ctx.teacher(3)),
            Path(group.group.id),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let err = get_invite_link(State(ctx.state.clone()), Auth(ctx.teacher(3)), Path(999))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_groups_covers_taught_and_joined() {
        let ctx = TestContext::new();
        let taught = create(&ctx, ctx.teacher(1), "Taught").await;
        let other = create(&ctx, ctx.teacher(5), "Joined").await;
        ctx.db()
            .add_member(other.group.id, 1, ctx.clock.now())
            .unwrap();

        let Json(groups) = list_groups(
            State(ctx.state.clone()),
            Auth(ctx.db().get_user(1).unwrap().unwrap()),
        )
        .await
        .unwrap();
        let ids: Vec<u64> = groups.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![taught.group.id, other.group.id]);
    }

    #[tokio::test]
    async fn teacher_can_pause_group() {
        let ctx = TestContext::new();
        let group = create(&ctx, ctx.teacher(1), "Geometry").await;

        let Json(paused) = update_group_status(
            State(ctx.state.clone()),
            TeacherOnly(ctx.db().get_user(1).unwrap().unwrap()),
            Path(group.group.id),
            Json(UpdateGroupStatusRequest { active: false }),
        )
        .await
        .unwrap();
        assert!(!paused.active);

        let err = update_group_status(
            State(ctx.state.clone()),
            TeacherOnly(ctx.teacher(9)),
            Path(group.group.id),
            Json(UpdateGroupStatusRequest { active: true }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn homework_list_requires_membership() {
        let ctx = TestContext::new();
        let group = create(&ctx, ctx.teacher(1), "Geometry").await;
        let member = ctx.student(2);
        let outsider = ctx.student(3);
        ctx.db()
            .add_member(group.group.id, 2, ctx.clock.now())
            .unwrap();
        let hw = ctx
            .db()
            .create_homework(
                NewHomework {
                    group_id: group.group.id,
                    description: "Triangles".to_string(),
                    deadline: ctx.clock.now() + chrono::Duration::days(1),
                },
                ctx.clock.now(),
            )
            .unwrap();
        ctx.db().complete_homework(hw.id, 2, ctx.clock.now()).unwrap();

        let Json(seen) =
            list_group_homework(State(ctx.state.clone()), Auth(member), Path(group.group.id))
                .await
                .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].completed, Some(true));

        let Json(owner_view) = list_group_homework(
            State(ctx.state.clone()),
            Auth(ctx.db().get_user(1).unwrap().unwrap()),
            Path(group.group.id),
        )
        .await
        .unwrap();
        assert_eq!(owner_view[0].completed, None);

        let err =
            list_group_homework(State(ctx.state.clone()), Auth(outsider), Path(group.group.id))
                .await
                .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
