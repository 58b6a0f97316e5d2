// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Telegram Bot API delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{DeliveryError, MessageGateway, WebAppButton};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends messages with the Bot API `sendMessage` method.
pub struct TelegramGateway {
    api_base_url: String,
    bot_token: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramGateway {
    pub fn new(api_base_url: &str, bot_token: &str) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DeliveryError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            http,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base_url, self.bot_token)
    }

    async fn send_message(&self, payload: &Value) -> Result<(), DeliveryError> {
        // The URL embeds the bot token; errors are reported without it.
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                DeliveryError::Request(format!("sendMessage failed: {}", e.without_url()))
            })?;

        let status = response.status();
        let body: BotApiResponse = response.json().await.map_err(|e| {
            DeliveryError::Request(format!(
                "sendMessage returned {status} with invalid JSON: {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() || !body.ok {
            return Err(DeliveryError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("sendMessage returned {status}")),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl MessageGateway for TelegramGateway {
    async fn send(&self, external_id: i64, text: &str) -> Result<(), DeliveryError> {
        self.send_message(&json!({
            "chat_id": external_id,
            "text": text,
        }))
        .await
    }

    async fn send_with_button(
        &self,
        external_id: i64,
        text: &str,
        button: &WebAppButton,
    ) -> Result<(), DeliveryError> {
        self.send_message(&json!({
            "chat_id": external_id,
            "text": text,
            "reply_markup": {
                "inline_keyboard": [[{
                    "text": button.text,
                    "web_app": { "url": button.url }
                }]]
            }
        }))
        .await
    }
}
