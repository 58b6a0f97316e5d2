// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification of Telegram Mini App initData.
//!
//! initData is a URL-encoded key/value string signed by the platform:
//!
//! 1. every pair except `hash` is sorted by key and joined as `key=value`
//!    lines separated by `\n` (the check string)
//! 2. `secret_key = HMAC-SHA256(key = "WebAppData", message = bot_secret)`
//! 3. `hash = hex(HMAC-SHA256(key = secret_key, message = check_string))`
//!
//! Verification is pure: the same input and `now` always give the same
//! result, and nothing is read from or written to storage.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use url::form_urlencoded;

use super::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Fixed HMAC key used to derive the per-bot secret key.
const WEB_APP_DATA_KEY: &[u8] = b"WebAppData";

const HASH_FIELD: &str = "hash";
const AUTH_DATE_FIELD: &str = "auth_date";
const USER_FIELD: &str = "user";

/// The `user` object embedded in initData.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct InitDataUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub language_code: Option<String>,
}

/// A claim whose signature and freshness have been checked.
#[derive(Debug, Clone)]
pub struct VerifiedInitData {
    /// Decoded fields, excluding `hash`.
    pub fields: BTreeMap<String, String>,
    pub user: InitDataUser,
    pub auth_date: DateTime<Utc>,
}

/// Verify a raw initData string against the bot secret.
///
/// Checks run in order: parse, signature, `auth_date`, `user`. A claim is
/// expired when `now - auth_date > max_age`; claims dated in the future are
/// accepted.
pub fn verify_init_data(
    raw: &str,
    bot_secret: &str,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<VerifiedInitData, AuthError> {
    let (fields, received_hash) = parse_fields(raw)?;

    // Invalid hex can never match, so it is a signature failure.
    let received = hex::decode(&received_hash).map_err(|_| AuthError::SignatureMismatch)?;
    let mut mac = HmacSha256::new_from_slice(&secret_key(bot_secret)?)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    mac.update(check_string(&fields).as_bytes());
    mac.verify_slice(&received)
        .map_err(|_| AuthError::SignatureMismatch)?;

    let auth_date_secs = fields
        .get(AUTH_DATE_FIELD)
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(AuthError::MalformedClaim)?;
    let auth_date =
        DateTime::<Utc>::from_timestamp(auth_date_secs, 0).ok_or(AuthError::MalformedClaim)?;

    let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
    if now.timestamp().saturating_sub(auth_date_secs) > max_age_secs {
        return Err(AuthError::ClaimExpired);
    }

    let user: InitDataUser = fields
        .get(USER_FIELD)
        .and_then(|v| serde_json::from_str(v).ok())
        .ok_or(AuthError::MalformedClaim)?;

    Ok(VerifiedInitData {
        fields,
        user,
        auth_date,
    })
}

/// Split raw initData into decoded fields and the received hash.
///
/// The first occurrence of a duplicated key wins.
fn parse_fields(raw: &str) -> Result<(BTreeMap<String, String>, String), AuthError> {
    if raw.trim().is_empty() {
        return Err(AuthError::MalformedClaim);
    }
    for segment in raw.split('&').filter(|s| !s.is_empty()) {
        match segment.split_once('=') {
            Some((key, _)) if !key.is_empty() => {}
            _ => return Err(AuthError::MalformedClaim),
        }
    }

    let mut fields = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    let hash = fields.remove(HASH_FIELD).ok_or(AuthError::MalformedClaim)?;
    Ok((fields, hash))
}

/// Sorted `key=value` lines joined by `\n`.
fn check_string(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `HMAC-SHA256(key = "WebAppData", message = bot_secret)`.
fn secret_key(bot_secret: &str) -> Result<Vec<u8>, AuthError> {
    let mut mac = HmacSha256::new_from_slice(WEB_APP_DATA_KEY)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    mac.update(bot_secret.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Hex signature for a set of fields.
#[cfg(test)]
fn sign_fields(
    fields: &BTreeMap<String, String>,
    bot_secret: &str,
) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(&secret_key(bot_secret)?)
        .map_err(|e| AuthError::InternalError(e.to_string()))?;
    mac.update(check_string(fields).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a signed, URL-encoded initData string from the given pairs.
#[cfg(test)]
pub(crate) fn signed_init_data(pairs: &[(&str, &str)], bot_secret: &str) -> String {
    let fields: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let hash = sign_fields(&fields, bot_secret).unwrap();

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k, v);
    }
    serializer.append_pair(HASH_FIELD, &hash);
    serializer.finish()
}

/// Signed initData for a user with the given id, dated `auth_date`.
#[cfg(test)]
pub(crate) fn signed_init_data_for(
    user_id: i64,
    auth_date: DateTime<Utc>,
    bot_secret: &str,
) -> String {
    let user = format!(r#"{{"id":{user_id},"first_name":"Test","username":"user{user_id}"}}"#);
    let auth_date = auth_date.timestamp().to_string();
    signed_init_data(
        &[("auth_date", auth_date.as_str()), ("user", user.as_str())],
        bot_secret,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "S";
    const DAY: Duration = Duration::from_secs(24 * 3600);

    const GOLDEN_USER_ENCODED: &str = "%7B%22id%22%3A279058397%2C%22first_name%22%3A\
        %22Vladislav%22%2C%22last_name%22%3A%22Kibenko%22%2C%22username%22%3A%22vdkfrost\
        %22%2C%22language_code%22%3A%22ru%22%7D";
    const GOLDEN_HASH: &str = "2f5f6533d4084acd48db5f1a61704852f09ee0dd4a58d4731063a141238dc592";
    /// Hash produced when key and message are swapped in the secret derivation.
    const SWAPPED_HASH: &str = "1032b642d47864123073bfd5d0642bbccd56e55309af92326e629ea8873ce73e";

    fn golden(hash: &str) -> String {
        format!(
            "query_id=AAHdF6IQAAAAAN0XohDhrOrc&user={GOLDEN_USER_ENCODED}\
             &auth_date=1700000000&hash={hash}"
        )
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn secret_key_uses_web_app_data_as_key() {
        assert_eq!(
            hex::encode(secret_key(SECRET).unwrap()),
            "7645aadea9cd7e06f8aba398cfa7e5df0978d0ea825916940bcb630e94abbbbe"
        );
    }

    #[test]
    fn golden_vector_verifies() {
        let verified =
            verify_init_data(&golden(GOLDEN_HASH), SECRET, DAY, at(1_700_000_060)).unwrap();
        assert_eq!(verified.user.id, 279058397);
        assert_eq!(verified.user.username.as_deref(), Some("vdkfrost"));
        assert_eq!(verified.user.language_code.as_deref(), Some("ru"));
        assert_eq!(verified.auth_date, at(1_700_000_000));
        assert!(!verified.fields.contains_key("hash"));
        assert_eq!(verified.fields.len(), 3);
    }

    #[test]
    fn signing_the_golden_fields_reproduces_its_hash() {
        let verified =
            verify_init_data(&golden(GOLDEN_HASH), SECRET, DAY, at(1_700_000_060)).unwrap();
        assert_eq!(sign_fields(&verified.fields, SECRET).unwrap(), GOLDEN_HASH);
    }

    #[test]
    fn swapped_key_derivation_is_rejected() {
        let err = verify_init_data(&golden(SWAPPED_HASH), SECRET, DAY, at(1_700_000_060))
            .unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn single_character_change_in_hash_is_rejected() {
        let mut tampered = GOLDEN_HASH.to_string();
        tampered.replace_range(0..1, "3");
        let err =
            verify_init_data(&golden(&tampered), SECRET, DAY, at(1_700_000_060)).unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn tampered_field_is_rejected() {
        let raw = golden(GOLDEN_HASH).replace("AAHdF6IQ", "AAHdF6IR");
        let err = verify_init_data(&raw, SECRET, DAY, at(1_700_000_060)).unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let err =
            verify_init_data(&golden(GOLDEN_HASH), "T", DAY, at(1_700_000_060)).unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn non_hex_hash_is_signature_mismatch() {
        let err =
            verify_init_data(&golden("zz-not-hex"), SECRET, DAY, at(1_700_000_060)).unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[test]
    fn freshness_window_is_enforced() {
        let now = Utc::now();

        let fresh = signed_init_data_for(1, now - chrono::Duration::hours(23), SECRET);
        assert!(verify_init_data(&fresh, SECRET, DAY, now).is_ok());

        let stale = signed_init_data_for(1, now - chrono::Duration::hours(25), SECRET);
        let err = verify_init_data(&stale, SECRET, DAY, now).unwrap_err();
        assert!(matches!(err, AuthError::ClaimExpired));
    }

    #[test]
    fn claim_exactly_at_max_age_is_accepted() {
        let now = at(1_700_000_000 + 24 * 3600);
        assert!(verify_init_data(&golden(GOLDEN_HASH), SECRET, DAY, now).is_ok());

        let one_later = at(1_700_000_000 + 24 * 3600 + 1);
        let err = verify_init_data(&golden(GOLDEN_HASH), SECRET, DAY, one_later).unwrap_err();
        assert!(matches!(err, AuthError::ClaimExpired));
    }

    #[test]
    fn future_auth_date_is_accepted() {
        let now = Utc::now();
        let raw = signed_init_data_for(5, now + chrono::Duration::minutes(10), SECRET);
        assert!(verify_init_data(&raw, SECRET, DAY, now).is_ok());
    }

    #[test]
    fn missing_hash_is_malformed() {
        let raw = "auth_date=1700000000&user=%7B%22id%22%3A1%7D";
        let err = verify_init_data(raw, SECRET, DAY, at(1_700_000_000)).unwrap_err();
        assert!(matches!(err, AuthError::MalformedClaim));
    }

    #[test]
    fn empty_or_garbled_input_is_malformed() {
        for raw in ["", "   ", "no-equals-sign", "=value&hash=00", "a=1&&broken"] {
            let err = verify_init_data(raw, SECRET, DAY, at(1_700_000_000)).unwrap_err();
            assert!(matches!(err, AuthError::MalformedClaim), "input {raw:?}");
        }
    }

    #[test]
    fn missing_or_non_numeric_auth_date_is_malformed() {
        let now = Utc::now();
        let no_date = signed_init_data(&[("user", r#"{"id":1}"#)], SECRET);
        assert!(matches!(
            verify_init_data(&no_date, SECRET, DAY, now).unwrap_err(),
            AuthError::MalformedClaim
        ));

        let bad_date = signed_init_data(
            &[("auth_date", "yesterday"), ("user", r#"{"id":1}"#)],
            SECRET,
        );
        assert!(matches!(
            verify_init_data(&bad_date, SECRET, DAY, now).unwrap_err(),
            AuthError::MalformedClaim
        ));
    }

    #[test]
    fn missing_user_or_id_is_malformed() {
        let now = Utc::now();
        let date = now.timestamp().to_string();

        let no_user = signed_init_data(&[("auth_date", date.as_str())], SECRET);
        assert!(matches!(
            verify_init_data(&no_user, SECRET, DAY, now).unwrap_err(),
            AuthError::MalformedClaim
        ));

        for user in [r#"{"first_name":"A"}"#, r#"{"id":"123"}"#, "not json"] {
            let raw = signed_init_data(&[("auth_date", date.as_str()), ("user", user)], SECRET);
            assert!(
                matches!(
                    verify_init_data(&raw, SECRET, DAY, now).unwrap_err(),
                    AuthError::MalformedClaim
                ),
                "user {user:?}"
            );
        }
    }

    #[test]
    fn duplicate_keys_keep_first_occurrence() {
        let now = Utc::now();
        let raw = signed_init_data_for(9, now, SECRET);
        let with_dup = format!("{raw}&auth_date=1");
        let verified = verify_init_data(&with_dup, SECRET, DAY, now).unwrap();
        assert_eq!(verified.auth_date.timestamp(), now.timestamp());
    }

    #[test]
    fn verification_is_deterministic() {
        let now = at(1_700_000_060);
        let raw = golden(GOLDEN_HASH);
        let a = verify_init_data(&raw, SECRET, DAY, now).unwrap();
        let b = verify_init_data(&raw, SECRET, DAY, now).unwrap();
        assert_eq!(a.fields, b.fields);
        assert_eq!(a.user, b.user);
    }
}
