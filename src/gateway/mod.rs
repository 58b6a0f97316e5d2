// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Outbound message delivery.
//!
//! The reminder engine only needs "send this text to that user"; it never
//! learns how the message travels.

pub mod telegram;

#[cfg(test)]
pub mod recording;

use async_trait::async_trait;

pub use telegram::TelegramGateway;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Request(String),

    #[error("message rejected by platform: {0}")]
    Rejected(String),
}

/// Inline button that opens the Mini App.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAppButton {
    pub text: String,
    pub url: String,
}

/// Delivery capability for user-facing messages.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Send `text` to the user with the given platform id.
    async fn send(&self, external_id: i64, text: &str) -> Result<(), DeliveryError>;

    /// Send `text` with a button opening the Mini App. Gateways without
    /// button support send the bare text.
    async fn send_with_button(
        &self,
        external_id: i64,
        text: &str,
        _button: &WebAppButton,
    ) -> Result<(), DeliveryError> {
        self.send(external_id, text).await
    }
}
