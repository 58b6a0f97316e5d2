// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Classroom Server - homework coordination backend for a Telegram Mini App
//!
//! Teachers create groups and assign homework; students join with invite
//! codes and get a reminder shortly before each deadline.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Telegram initData authentication and role checks
//! - `gateway` - Outbound message delivery (Telegram Bot API)
//! - `reminders` - Deadline scanning and at-most-once reminder dispatch
//! - `storage` - Embedded redb database

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod reminders;
pub mod state;
pub mod storage;
