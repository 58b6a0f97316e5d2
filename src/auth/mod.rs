// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Telegram Mini App initData authentication.
//!
//! ## Auth Flow
//!
//! 1. The Mini App frontend receives signed initData from Telegram
//! 2. It sends the raw string in the `X-Telegram-Init-Data` header
//! 3. The server:
//!    - verifies the HMAC-SHA256 signature with the bot secret
//!    - rejects claims older than the freshness window
//!    - maps `user.id` to an application user, registering it on first contact
//!
//! ## Security
//!
//! - All non-health endpoints require authentication
//! - Signatures are compared in constant time
//! - No user is loaded or created before the signature check passes

pub mod error;
pub mod extractor;
pub mod guard;
pub mod init_data;
pub mod resolver;
pub mod roles;

pub use error::AuthError;
pub use extractor::{Auth, Login, StudentOnly, TeacherOnly, INIT_DATA_HEADER};
pub use guard::authenticate;
pub use init_data::{verify_init_data, InitDataUser, VerifiedInitData};
pub use resolver::{resolve_identity, ResolvedUser};
pub use roles::Role;
