// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Main-screen summary for the Mini App.

use axum::{extract::State, Json};
use chrono::Datelike;

use crate::{
    auth::{Auth, Role},
    error::ApiError,
    models::{DashboardGroup, DashboardResponse, HomeworkResponse, TodayScheduleItem},
    state::AppState,
    storage::DayOfWeek,
};

#[utoipa::path(
    get,
    path = "/api/v1/user/dashboard",
    tag = "User",
    params(("X-Telegram-Init-Data" = String, Header, description = "Raw Telegram initData")),
    responses((status = 200, body = DashboardResponse))
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<DashboardResponse>, ApiError> {
    let now = state.clock.now();
    let today = DayOfWeek::from(now.weekday());
    let groups = state.db.list_groups_for_user(user.external_id)?;

    let mut dashboard_groups = Vec::with_capacity(groups.len());
    let mut today_schedule = Vec::new();
    let mut active_homework = Vec::new();
    for group in &groups {
        let teacher_name = match state.db.get_user(group.teacher_id)? {
            Some(teacher) => teacher.display_name(),
            None => "Unknown".to_string(),
        };
        dashboard_groups.push(DashboardGroup {
            id: group.id,
            name: group.name.clone(),
            teacher_name,
            student_count: state.db.list_member_ids(group.id)?.len(),
            active: group.active,
        });

        for item in state.db.list_schedule_for_group(group.id)? {
            if item.day_of_week != today {
                continue;
            }
            today_schedule.push(TodayScheduleItem {
                id: item.id,
                group_name: group.name.clone(),
                day_of_week: item.day_of_week,
                time_at: item.time_at,
                meeting_link: item.meeting_link,
            });
        }

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
    today_schedule.sort_by_key(|item| (item.time_at, item.id));
    active_homework.sort_by_key(|h| (h.deadline, h.id));

    Ok(Json(DashboardResponse {
        role: user.role,
        groups: dashboard_groups,
        today_schedule,
        active_homework,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::Clock;
    use crate::state::TestContext;
    use crate::storage::{NewHomework, NewScheduleItem, ProfileUpdate};
    use chrono::{Duration, NaiveTime};

    #[tokio::test]
    async fn dashboard_lists_groups_and_upcoming_homework() {
        let ctx = TestContext::new();
        ctx.teacher(1);
        ctx.db()
            .update_user_profile(
                1,
                ProfileUpdate {
                    first_name: "Anna".to_string(),
                    last_name: "Kuznetsova".to_string(),
                    patronymic: Some("Petrovna".to_string()),
                    timezone: "UTC".to_string(),
                },
            )
            .unwrap();
        let group = ctx.db().create_group(1, "Music", ctx.clock.now()).unwrap();
        let student = ctx.student(2);
        ctx.db().add_member(group.id, 2, ctx.clock.now()).unwrap();

        let now = ctx.clock.now();
        for (description, offset) in [("later", 5), ("past", -1), ("sooner", 2)] {
            ctx.db()
                .create_homework(
                    NewHomework {
                        group_id: group.id,
                        description: description.to_string(),
                        deadline: now + Duration::hours(offset),
                    },
                    now,
                )
                .unwrap();
        }

        let Json(dash) = dashboard(State(ctx.state.clone()), Auth(student)).await.unwrap();
        assert_eq!(dash.role, Role::Student);
        assert_eq!(dash.groups.len(), 1);
        assert_eq!(dash.groups[0].teacher_name, "Kuznetsova Anna Petrovna");
        assert_eq!(dash.groups[0].student_count, 1);

        let upcoming: Vec<&str> = dash
            .active_homework
            .iter()
            .map(|h| h.description.as_str())
            .collect();
        assert_eq!(upcoming, vec!["sooner", "later"]);
        assert!(dash.active_homework.iter().all(|h| h.completed == Some(false)));
        assert!(dash.today_schedule.is_empty());
    }

    #[tokio::test]
    async fn today_schedule_follows_the_utc_weekday() {
        let ctx = TestContext::new();
        let teacher = ctx.teacher(1);
        let group = ctx.db().create_group(1, "Drawing", ctx.clock.now()).unwrap();
        // The test clock starts on a Sunday.
        for (day, hour) in [
            (DayOfWeek::Sunday, 19),
            (DayOfWeek::Monday, 8),
            (DayOfWeek::Sunday, 7),
        ] {
            ctx.db()
                .create_schedule_item(
                    NewScheduleItem {
                        group_id: group.id,
                        day_of_week: day,
                        time_at: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                        duration_minutes: None,
                        meeting_link: Some("https://meet.example/art".to_string()),
                    },
                    ctx.clock.now(),
                )
                .unwrap();
        }

        let Json(dash) = dashboard(State(ctx.state.clone()), Auth(teacher.clone())).await.unwrap();
        let hours: Vec<String> = dash
            .today_schedule
            .iter()
            .map(|item| item.time_at.format("%H:%M").to_string())
            .collect();
        assert_eq!(hours, vec!["07:00", "19:00"]);
        assert!(dash.today_schedule.iter().all(|item| item.group_name == "Drawing"));

        ctx.clock.advance(Duration::days(1));
        let Json(dash) = dashboard(State(ctx.state.clone()), Auth(teacher)).await.unwrap();
        assert_eq!(dash.today_schedule.len(), 1);
        assert_eq!(dash.today_schedule[0].day_of_week, DayOfWeek::Monday);
    }
}
