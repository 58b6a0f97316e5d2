// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! "New homework" notification sent when a teacher assigns homework.
//!
//! Fire-and-forget: callers spawn it and only the logs see the outcome.

use std::sync::Arc;

use tracing::{info, warn};

use super::dispatcher::DeliverySummary;
use super::messages::{NEW_HOMEWORK_BUTTON, NEW_HOMEWORK_TEXT};
use crate::gateway::{MessageGateway, WebAppButton};
use crate::storage::{Database, DbResult, StoredHomework};

/// Notify every active student of the homework's group.
///
/// When `web_app_url` is set the message carries a button opening the
/// Mini App.
pub async fn notify_new_homework(
    db: Arc<Database>,
    gateway: Arc<dyn MessageGateway>,
    homework: StoredHomework,
    web_app_url: Option<String>,
) -> DbResult<DeliverySummary> {
    let button = web_app_url.map(|url| WebAppButton {
        text: NEW_HOMEWORK_BUTTON.to_string(),
        url,
    });

    let mut summary = DeliverySummary::default();
    for student_id in db.list_member_ids(homework.group_id)? {
        if !db.get_user(student_id)?.is_some_and(|u| u.active) {
            continue;
        }

        let result = match &button {
            Some(button) => gateway.send_with_button(student_id, NEW_HOMEWORK_TEXT, button).await,
            None => gateway.send(student_id, NEW_HOMEWORK_TEXT).await,
        };
        match result {
            Ok(()) => summary.delivered += 1,
            Err(e) => {
                summary.failed += 1;
                warn!(
                    homework_id = homework.id,
                    student_id,
                    error = %e,
                    "New homework notification failed"
                );
            }
        }
    }

    info!(
        homework_id = homework.id,
        group_id = homework.group_id,
        delivered = summary.delivered,
        failed = summary.failed,
        "New homework notifications sent"
    );
    Ok(summary)
}
