//! Doctor sign-in sessions.
//!
//! A trusted identity callback signs a doctor in; the doctor then carries an
//! opaque bearer token. Only its SHA-256 is stored.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::api::types::{generate_token, hash_token};
use crate::config::SESSION_TTL_HOURS;
use crate::db::{self, DatabaseError};
use crate::models::DoctorIdentity;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Constant-time comparison of a presented identity secret.
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    hash_token(presented).ct_eq(&hash_token(expected)).into()
}

/// Upsert the doctor's identity fields and open a 24-hour session.
/// Verification fields on an existing profile are left as they are.
pub fn sign_in(
    conn: &Connection,
    identity: &DoctorIdentity,
    now: DateTime<Utc>,
) -> Result<IssuedSession, DatabaseError> {
    db::upsert_user_identity(conn, identity, now)?;

    let token = generate_token();
    let expires_at = now + Duration::hours(SESSION_TTL_HOURS);
    db::insert_session(conn, &hash_token(&token), &identity.uid, now, expires_at)?;

    tracing::info!(doctor_uid = %identity.uid, "Doctor signed in");
    Ok(IssuedSession { token, expires_at })
}

/// Doctor uid behind a bearer token, if the session is live.
pub fn resolve(
    conn: &Connection,
    token_hash: &[u8; 32],
    now: DateTime<Utc>,
) -> Result<Option<String>, DatabaseError> {
    db::touch_session(conn, token_hash, now)
}

/// End a session. Returns `false` if it was already gone.
pub fn sign_out(conn: &Connection, token_hash: &[u8; 32]) -> Result<bool, DatabaseError> {
    db::delete_session(conn, token_hash)
}
