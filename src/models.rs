// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive
//! `Serialize` or `Deserialize` plus `ToSchema` for automatic JSON handling
//! and OpenAPI documentation.
//!
//! ## Model Categories
//!
//! - **Users**: login, profile and role updates
//! - **Groups**: creation, invites, membership, dashboard
//! - **Homework**: assignment and completion
//! - **Schedule**: weekly classes of a group

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::{DayOfWeek, StoredGroup, StoredHomework, StoredScheduleItem, StoredUser};

// =============================================================================
// Users
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    /// Telegram user id
    pub external_id: i64,
    pub role: Role,
    /// IANA timezone used to render deadlines
    pub timezone: String,
    pub active: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub patronymic: Option<String>,
    pub username: Option<String>,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        let display_name = user.display_name();
        Self {
            external_id: user.external_id,
            role: user.role,
            timezone: user.timezone,
            active: user.active,
            first_name: user.first_name,
            last_name: user.last_name,
            patronymic: user.patronymic,
            username: user.username,
            display_name,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// True when this login registered the user
    pub is_new_user: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub patronymic: Option<String>,
    /// IANA timezone name, e.g. `Europe/Moscow`
    pub timezone: String,
}

// =============================================================================
// Groups
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct GroupResponse {
    pub id: u64,
    pub teacher_id: i64,
    pub name: String,
    /// Paused groups receive no reminders
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<StoredGroup> for GroupResponse {
    fn from(group: StoredGroup) -> Self {
        Self {
            id: group.id,
            teacher_id: group.teacher_id,
            name: group.name,
            active: group.active,
            created_at: group.created_at,
        }
    }
}

/// Returned to the owning teacher on creation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupWithInviteResponse {
    #[serde(flatten)]
    pub group: GroupResponse,
    pub invite_code: String,
    pub invite_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InviteLinkResponse {
    pub group_id: u64,
    pub group_name: String,
    pub invite_code: String,
    pub invite_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JoinGroupResponse {
    pub group: GroupResponse,
    /// False when the student was already a member
    pub joined: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateGroupStatusRequest {
    pub active: bool,
}

// =============================================================================
// Homework
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateHomeworkRequest {
    pub group_id: u64,
    pub description: String,
    /// Deadline instant; offsets are normalized to UTC
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct HomeworkResponse {
    pub id: u64,
    pub group_id: u64,
    pub description: String,
    pub deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub reminder_sent: bool,
    /// Whether the requesting student completed it (absent for teachers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl HomeworkResponse {
    pub fn new(homework: StoredHomework, completed: Option<bool>) -> Self {
        Self {
            id: homework.id,
            group_id: homework.group_id,
            description: homework.description,
            deadline: homework.deadline,
            created_at: homework.created_at,
            reminder_sent: homework.reminder_sent,
            completed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteHomeworkResponse {
    pub homework_id: u64,
    pub message: String,
}

// =============================================================================
// Schedule
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub group_id: u64,
    pub day_of_week: DayOfWeek,
    /// Start time of day in UTC, `HH:MM:SS`
    #[schema(value_type = String, example = "18:30:00")]
    pub time_at: NaiveTime,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ScheduleResponse {
    pub id: u64,
    pub group_id: u64,
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "18:30:00")]
    pub time_at: NaiveTime,
    pub duration_minutes: Option<u32>,
    pub meeting_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<StoredScheduleItem> for ScheduleResponse {
    fn from(item: StoredScheduleItem) -> Self {
        Self {
            id: item.id,
            group_id: item.group_id,
            day_of_week: item.day_of_week,
            time_at: item.time_at,
            duration_minutes: item.duration_minutes,
            meeting_link: item.meeting_link,
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserScheduleResponse {
    /// Classes of every group the user teaches or attends, in weekly order
    pub schedules: Vec<ScheduleResponse>,
    pub active_homework: Vec<HomeworkResponse>,
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TodayScheduleItem {
    pub id: u64,
    pub group_name: String,
    pub day_of_week: DayOfWeek,
    #[schema(value_type = String, example = "18:30:00")]
    pub time_at: NaiveTime,
    pub meeting_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardGroup {
    pub id: u64,
    pub name: String,
    pub teacher_name: String,
    pub student_count: usize,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub role: Role,
    pub groups: Vec<DashboardGroup>,
    /// Classes on the current UTC weekday, by start time
    pub today_schedule: Vec<TodayScheduleItem>,
    /// Homework whose deadline has not passed, earliest first
    pub active_homework: Vec<HomeworkResponse>,
}
