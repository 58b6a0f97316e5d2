// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BOT_SECRET` | Shared secret used to verify Mini App initData | Required |
//! | `BOT_TOKEN` | Bot API token used to deliver messages | Required |
//! | `BOT_USERNAME` | Bot username used in invite deep links | `your_bot_username` |
//! | `INIT_DATA_MAX_AGE_SECS` | Maximum initData age | `86400` |
//! | `REMINDER_SCAN_INTERVAL_SECS` | Interval between reminder scans | `60` |
//! | `REMINDER_LOOKAHEAD_SECS` | How far ahead of a deadline a reminder fires | `3600` |
//! | `REMINDER_TICK_BUDGET_SECS` | Wall-clock budget for one scan tick | `45` |
//! | `REMINDER_CLAIM_LEASE_SECS` | Delivery lease, never below the tick budget | `120` |
//! | `CLASS_REMINDER_LEAD_SECS` | How long before a class its reminder fires | `3600` |
//! | `TELEGRAM_API_BASE_URL` | Bot API base URL | `https://api.telegram.org` |
//! | `DATA_DIR` | Directory holding the database file | `./data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8000` |
//! | `FRONTEND_DOMAIN` | Mini App origin | `https://your-frontend-domain.com` |
//! | `API_DOMAIN` | API origin allowed for CORS | empty |
//! | `CORS_ORIGINS` | Comma-separated explicit CORS origins | empty |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

pub const BOT_SECRET_ENV: &str = "BOT_SECRET";
pub const BOT_TOKEN_ENV: &str = "BOT_TOKEN";
pub const BOT_USERNAME_ENV: &str = "BOT_USERNAME";
pub const INIT_DATA_MAX_AGE_ENV: &str = "INIT_DATA_MAX_AGE_SECS";
pub const REMINDER_SCAN_INTERVAL_ENV: &str = "REMINDER_SCAN_INTERVAL_SECS";
pub const REMINDER_LOOKAHEAD_ENV: &str = "REMINDER_LOOKAHEAD_SECS";
pub const REMINDER_TICK_BUDGET_ENV: &str = "REMINDER_TICK_BUDGET_SECS";
pub const REMINDER_CLAIM_LEASE_ENV: &str = "REMINDER_CLAIM_LEASE_SECS";
pub const CLASS_REMINDER_LEAD_ENV: &str = "CLASS_REMINDER_LEAD_SECS";
pub const TELEGRAM_API_BASE_URL_ENV: &str = "TELEGRAM_API_BASE_URL";

/// Environment variable name for the data directory path.
///
/// The redb database file `classroom.redb` is created inside it.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const FRONTEND_DOMAIN_ENV: &str = "FRONTEND_DOMAIN";
pub const API_DOMAIN_ENV: &str = "API_DOMAIN";
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_INIT_DATA_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_TICK_BUDGET: Duration = Duration::from_secs(45);
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(120);
pub const DEFAULT_CLASS_REMINDER_LEAD: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";
pub const DEFAULT_BOT_USERNAME: &str = "your_bot_username";
pub const DEFAULT_FRONTEND_DOMAIN: &str = "https://your-frontend-domain.com";
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

/// Database file name inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "classroom.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(String),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}

/// Settings consumed by the initData verifier.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Shared secret the platform signs initData with.
    pub bot_secret: String,
    /// Claims older than this are rejected.
    pub max_age: Duration,
}

impl AuthSettings {
    pub fn new(bot_secret: impl Into<String>) -> Self {
        Self {
            bot_secret: bot_secret.into(),
            max_age: DEFAULT_INIT_DATA_MAX_AGE,
        }
    }
}

/// Settings consumed by the reminder scheduler.
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub scan_interval: Duration,
    /// Homework reminders fire once the deadline is this close.
    pub lookahead: Duration,
    /// No new item is started after this much of a tick has elapsed.
    pub tick_budget: Duration,
    /// Must outlast any single delivery, so never shorter than `tick_budget`.
    pub claim_lease: Duration,
    /// Class reminders fire this long before the class starts.
    pub class_lead: Duration,
}

impl ReminderSettings {
    /// Reject combinations under which a live delivery could lose its lease.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.claim_lease < self.tick_budget {
            return Err(ConfigError::Invalid {
                name: REMINDER_CLAIM_LEASE_ENV.to_string(),
                value: format!(
                    "{}s is shorter than the {}s tick budget",
                    self.claim_lease.as_secs(),
                    self.tick_budget.as_secs()
                ),
            });
        }
        Ok(())
    }
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            lookahead: DEFAULT_LOOKAHEAD,
            tick_budget: DEFAULT_TICK_BUDGET,
            claim_lease: DEFAULT_CLAIM_LEASE,
            class_lead: DEFAULT_CLASS_REMINDER_LEAD,
        }
    }
}

/// Full application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub auth: AuthSettings,
    pub reminders: ReminderSettings,
    pub bot_token: String,
    pub bot_username: String,
    pub telegram_api_base_url: String,
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub frontend_domain: String,
    pub api_domain: String,
    pub cors_origins: String,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth = AuthSettings {
            bot_secret: env_required(BOT_SECRET_ENV)?,
            max_age: env_duration_secs(INIT_DATA_MAX_AGE_ENV, DEFAULT_INIT_DATA_MAX_AGE)?,
        };

        let reminders = ReminderSettings {
            scan_interval: env_duration_secs(REMINDER_SCAN_INTERVAL_ENV, DEFAULT_SCAN_INTERVAL)?,
            lookahead: env_duration_secs(REMINDER_LOOKAHEAD_ENV, DEFAULT_LOOKAHEAD)?,
            tick_budget: env_duration_secs(REMINDER_TICK_BUDGET_ENV, DEFAULT_TICK_BUDGET)?,
            claim_lease: env_duration_secs(REMINDER_CLAIM_LEASE_ENV, DEFAULT_CLAIM_LEASE)?,
            class_lead: env_duration_secs(CLASS_REMINDER_LEAD_ENV, DEFAULT_CLASS_REMINDER_LEAD)?,
        };
        reminders.validate()?;

        let port = match env_optional(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: PORT_ENV.to_string(),
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            auth,
            reminders,
            bot_token: env_required(BOT_TOKEN_ENV)?,
            bot_username: env_or_default(BOT_USERNAME_ENV, DEFAULT_BOT_USERNAME),
            telegram_api_base_url: env_or_default(
                TELEGRAM_API_BASE_URL_ENV,
                DEFAULT_TELEGRAM_API_BASE_URL,
            ),
            data_dir: PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            host: env_or_default(HOST_ENV, DEFAULT_HOST),
            port,
            frontend_domain: env_or_default(FRONTEND_DOMAIN_ENV, DEFAULT_FRONTEND_DOMAIN),
            api_domain: env_or_default(API_DOMAIN_ENV, ""),
            cors_origins: env_or_default(CORS_ORIGINS_ENV, ""),
        })
    }

    /// Settings for tests and local tooling; no environment access.
    pub fn for_tests(bot_secret: &str) -> Self {
        Self {
            auth: AuthSettings::new(bot_secret),
            reminders: ReminderSettings::default(),
            bot_token: "test-token".to_string(),
            bot_username: DEFAULT_BOT_USERNAME.to_string(),
            telegram_api_base_url: DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            frontend_domain: DEFAULT_FRONTEND_DOMAIN.to_string(),
            api_domain: String::new(),
            cors_origins: String::new(),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Origins allowed by CORS.
    ///
    /// An explicit `CORS_ORIGINS` list wins. Otherwise the frontend domain,
    /// the API domain (when distinct) and the `www.` variant of an https
    /// frontend domain are allowed.
    pub fn allowed_origins(&self) -> Vec<String> {
        if !self.cors_origins.is_empty() {
            return self
                .cors_origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        let mut origins = vec![self.frontend_domain.clone()];
        if !self.api_domain.is_empty() && self.api_domain != self.frontend_domain {
            origins.push(self.api_domain.clone());
        }
        if let Some(host) = self.frontend_domain.strip_prefix("https://") {
            if !host.starts_with("www.") {
                origins.push(format!("https://www.{host}"));
            }
        }
        origins
    }

    /// Mini App URL for message buttons, unless the frontend domain is
    /// still the placeholder.
    pub fn web_app_url(&self) -> Option<&str> {
        let domain = self.frontend_domain.as_str();
        (!domain.is_empty() && domain != DEFAULT_FRONTEND_DOMAIN).then_some(domain)
    }

    /// Deep link that opens the bot with a group join payload.
    pub fn invite_link(&self, invite_code: &str) -> String {
        format!(
            "https://t.me/{}?start=group_{invite_code}",
            self.bot_username
        )
    }
}

fn env_required(name: &str) -> Result<String, ConfigError> {
    env_optional(name).ok_or_else(|| ConfigError::Missing(name.to_string()))
}

fn env_optional(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed)
            }
        }
        Err(_) => None,
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_duration_secs(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env_optional(name) {
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::Invalid {
                name: name.to_string(),
                value: raw,
            }),
        None => Ok(default),
    }
}
