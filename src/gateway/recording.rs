// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory gateway that records every delivery attempt.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{DeliveryError, MessageGateway, WebAppButton};

#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<(i64, String)>>,
    buttons: Mutex<Vec<(i64, WebAppButton)>>,
    failing: Mutex<HashSet<i64>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries to `external_id` fail from now on.
    pub fn fail_for(&self, external_id: i64) {
        self.failing.lock().unwrap().insert(external_id);
    }

    /// Every send sleeps this long before completing.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Successful deliveries in order.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Buttons attached to successful deliveries.
    pub fn buttons(&self) -> Vec<(i64, WebAppButton)> {
        self.buttons.lock().unwrap().clone()
    }

    pub fn sent_to(&self, external_id: i64) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == external_id)
            .count()
    }
}

#[async_trait]
impl MessageGateway for RecordingGateway {
    async fn send(&self, external_id: i64, text: &str) -> Result<(), DeliveryError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&external_id) {
            return Err(DeliveryError::Rejected("bot was blocked by the user".to_string()));
        }
        self.sent.lock().unwrap().push((external_id, text.to_string()));
        Ok(())
    }

    async fn send_with_button(
        &self,
        external_id: i64,
        text: &str,
        button: &WebAppButton,
    ) -> Result<(), DeliveryError> {
        self.send(external_id, text).await?;
        self.buttons.lock().unwrap().push((external_id, button.clone()));
        Ok(())
    }
}
