// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{Role, INIT_DATA_HEADER},
    config::Settings,
    models::{
        CompleteHomeworkResponse, CreateGroupRequest, CreateHomeworkRequest,
        CreateScheduleRequest, DashboardGroup, DashboardResponse, GroupResponse,
        GroupWithInviteResponse, HomeworkResponse, InviteLinkResponse, JoinGroupRequest,
        JoinGroupResponse, LoginResponse, ScheduleResponse, TodayScheduleItem,
        UpdateGroupStatusRequest, UpdateProfileRequest, UpdateRoleRequest, UserResponse,
        UserScheduleResponse,
    },
    state::AppState,
    storage::DayOfWeek,
};

pub mod auth;
pub mod dashboard;
pub mod groups;
pub mod health;
pub mod homework;
pub mod schedule;

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);

    let v1_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/update-role", post(auth::update_role))
        .route("/auth/profile", post(auth::update_profile))
        .route(
            "/groups",
            get(groups::list_groups).post(groups::create_group),
        )
        .route("/groups/join", post(groups::join_group))
        .route(
            "/groups/{group_id}/invite-link",
            get(groups::get_invite_link),
        )
        .route(
            "/groups/{group_id}/status",
            post(groups::update_group_status),
        )
        .route(
            "/groups/{group_id}/homework",
            get(groups::list_group_homework),
        )
        .route("/homework", post(homework::create_homework))
        .route(
            "/homework/{homework_id}/complete",
            post(homework::complete_homework),
        )
        .route("/schedule", post(schedule::create_schedule_item))
        .route(
            "/schedule/{schedule_id}",
            delete(schedule::delete_schedule_item),
        )
        .route("/user/dashboard", get(dashboard::dashboard))
        .route("/user/schedule", get(schedule::user_schedule));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors)
}

/// CORS for the Mini App frontend. Invalid origins are logged and skipped.
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins()
        .into_iter()
        .filter_map(|origin| match HeaderValue::from_str(&origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(INIT_DATA_HEADER)])
        .allow_credentials(true)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::login,
        auth::me,
        auth::update_role,
        auth::update_profile,
        groups::create_group,
        groups::list_groups,
        groups::get_invite_link,
        groups::join_group,
        groups::update_group_status,
        groups::list_group_homework,
        homework::create_homework,
        homework::complete_homework,
        schedule::create_schedule_item,
        schedule::delete_schedule_item,
        schedule::user_schedule,
        dashboard::dashboard
    ),
    components(
        schemas(
            Role,
            UserResponse,
            LoginResponse,
            UpdateRoleRequest,
            UpdateProfileRequest,
            CreateGroupRequest,
            GroupResponse,
            GroupWithInviteResponse,
            InviteLinkResponse,
            JoinGroupRequest,
            JoinGroupResponse,
            UpdateGroupStatusRequest,
            CreateHomeworkRequest,
            HomeworkResponse,
            CompleteHomeworkResponse,
            DayOfWeek,
            CreateScheduleRequest,
            ScheduleResponse,
            UserScheduleResponse,
            TodayScheduleItem,
            DashboardGroup,
            DashboardResponse,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Telegram initData login and profile"),
        (name = "Groups", description = "Groups, invites and membership"),
        (name = "Homework", description = "Homework assignment and completion"),
        (name = "Schedule", description = "Weekly class schedule"),
        (name = "User", description = "Per-user summaries")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::Clock;
    use crate::state::TestContext;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt as _;

    async fn send(
        ctx: &TestContext,
        method: &str,
        uri: &str,
        init_data: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(init_data) = init_data {
            builder = builder.header(INIT_DATA_HEADER, init_data);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        router(ctx.state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let ctx = TestContext::new();
        // Ensure the router can be converted into a service without panicking.
        let _ = router(ctx.state.clone()).into_make_service();
    }

    #[tokio::test]
    async fn openapi_lists_api_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/auth/login"));
        assert!(doc.paths.paths.contains_key("/api/v1/homework/{homework_id}/complete"));
        assert!(doc.paths.paths.contains_key("/api/v1/schedule/{schedule_id}"));
    }

    #[tokio::test]
    async fn health_is_public() {
        let ctx = TestContext::new();
        let response = send(&ctx, "GET", "/health/live", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn missing_init_data_is_unauthorized() {
        let ctx = TestContext::new();
        let response = send(&ctx, "GET", "/api/v1/auth/me", None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "missing_init_data");
    }

    #[tokio::test]
    async fn expired_init_data_is_unauthorized() {
        let ctx = TestContext::new();
        let init_data = ctx.init_data_for(5);
        ctx.clock.advance(chrono::Duration::hours(25));

        let response = send(&ctx, "GET", "/api/v1/auth/me", Some(&init_data), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "claim_expired");
    }

    #[tokio::test]
    async fn inactive_user_is_forbidden() {
        let ctx = TestContext::new();
        ctx.student(5);
        ctx.db().set_user_active(5, false).unwrap();

        let init_data = ctx.init_data_for(5);
        let response = send(&ctx, "GET", "/api/v1/auth/me", Some(&init_data), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error_code"], "user_inactive");
    }

    #[tokio::test]
    async fn login_registers_then_recognizes() {
        let ctx = TestContext::new();
        let init_data = ctx.init_data_for(11);

        let response = send(&ctx, "POST", "/api/v1/auth/login", Some(&init_data), None).await;
        let first = json_body(response).await;
        assert_eq!(first["is_new_user"], true);
        assert_eq!(first["user"]["role"], "student");
        assert_eq!(first["user"]["username"], "user11");

        let response = send(&ctx, "POST", "/api/v1/auth/login", Some(&init_data), None).await;
        let second = json_body(response).await;
        assert_eq!(second["is_new_user"], false);
    }

    #[tokio::test]
    async fn classroom_flow_end_to_end() {
        let ctx = TestContext::new();
        let teacher = ctx.init_data_for(100);
        let student = ctx.init_data_for(200);

        // Students cannot create groups.
        let group_body = json!({"name": "Math"});
        let response =
            send(&ctx, "POST", "/api/v1/groups", Some(&teacher), Some(group_body.clone())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(response).await["error_code"], "insufficient_role");

        let response = send(
            &ctx,
            "POST",
            "/api/v1/auth/update-role",
            Some(&teacher),
            Some(json!({"role": "teacher"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&ctx, "POST", "/api/v1/groups", Some(&teacher), Some(group_body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let group = json_body(response).await;
        let group_id = group["id"].as_u64().unwrap();

        let response = send(
            &ctx,
            "POST",
            "/api/v1/groups/join",
            Some(&student),
            Some(json!({"invite_code": group["invite_code"]})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let deadline = ctx.clock.now() + chrono::Duration::minutes(30);
        let response = send(
            &ctx,
            "POST",
            "/api/v1/homework",
            Some(&teacher),
            Some(json!({
                "group_id": group_id,
                "description": "Quadratic equations",
                "deadline": deadline.to_rfc3339(),
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let homework_id = json_body(response).await["id"].as_u64().unwrap();

        let uri = format!("/api/v1/homework/{homework_id}/complete");
        let response = send(&ctx, "POST", &uri, Some(&student), None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&ctx, "POST", &uri, Some(&student), None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/api/v1/groups/{group_id}/homework");
        let listed = json_body(send(&ctx, "GET", &uri, Some(&student), None).await).await;
        assert_eq!(listed[0]["completed"], true);
    }

    #[tokio::test]
    async fn schedule_flow_end_to_end() {
        let ctx = TestContext::new();
        ctx.teacher(100);
        let group = ctx.db().create_group(100, "Chess", ctx.clock.now()).unwrap();
        ctx.student(200);
        ctx.db().add_member(group.id, 200, ctx.clock.now()).unwrap();
        let teacher = ctx.init_data_for(100);
        let student = ctx.init_data_for(200);

        let class = json!({
            "group_id": group.id,
            "day_of_week": "sunday",
            "time_at": "18:30:00",
            "meeting_link": "https://meet.example/chess",
        });
        let response =
            send(&ctx, "POST", "/api/v1/schedule", Some(&student), Some(class.clone())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(&ctx, "POST", "/api/v1/schedule", Some(&teacher), Some(class)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["day_of_week"], "sunday");
        assert_eq!(created["time_at"], "18:30:00");
        let schedule_id = created["id"].as_u64().unwrap();

        let response = send(&ctx, "GET", "/api/v1/user/schedule", Some(&student), None).await;
        let listed = json_body(response).await;
        assert_eq!(listed["schedules"][0]["id"], schedule_id);

        let response = send(&ctx, "GET", "/api/v1/user/dashboard", Some(&student), None).await;
        let dashboard = json_body(response).await;
        assert_eq!(dashboard["today_schedule"][0]["group_name"], "Chess");

        let uri = format!("/api/v1/schedule/{schedule_id}");
        let response = send(&ctx, "DELETE", &uri, Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&ctx, "DELETE", &uri, Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn cors_skips_invalid_origins() {
        let mut settings = Settings::for_tests("S");
        settings.cors_origins = "https://ok.example,bad\norigin".to_string();
        // Builds without panicking; the invalid entry is dropped.
        let _ = cors_layer(&settings);
    }
}
