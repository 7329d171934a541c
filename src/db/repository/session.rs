use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{format_timestamp, DatabaseError};

/// Store a doctor session. Only the SHA-256 of the bearer token is kept.
pub fn insert_session(
    conn: &Connection,
    token_hash: &[u8; 32],
    doctor_uid: &str,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO doctor_sessions (token_hash, doctor_uid, created_at, expires_at, last_used)
         VALUES (?1, ?2, ?3, ?4, ?3)",
        params![
            token_hash.as_slice(),
            doctor_uid,
            format_timestamp(&created_at),
            format_timestamp(&expires_at),
        ],
    )?;
    Ok(())
}

/// Resolve an unexpired session to its doctor uid and bump `last_used`.
pub fn touch_session(
    conn: &Connection,
    token_hash: &[u8; 32],
    now: DateTime<Utc>,
) -> Result<Option<String>, DatabaseError> {
    let ts = format_timestamp(&now);
    let doctor_uid: Option<String> = conn
        .query_row(
            "SELECT doctor_uid FROM doctor_sessions WHERE token_hash = ?1 AND expires_at > ?2",
            params![token_hash.as_slice(), ts],
            |row| row.get(0),
        )
        .optional()?;

    if doctor_uid.is_some() {
        conn.execute(
            "UPDATE doctor_sessions SET last_used = ?2 WHERE token_hash = ?1",
            params![token_hash.as_slice(), ts],
        )?;
    }
    Ok(doctor_uid)
}

pub fn delete_session(conn: &Connection, token_hash: &[u8; 32]) -> Result<bool, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM doctor_sessions WHERE token_hash = ?1",
        params![token_hash.as_slice()],
    )?;
    Ok(deleted > 0)
}

/// Remove sessions whose expiry has passed. Returns how many were removed.
pub fn prune_expired_sessions(conn: &Connection, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM doctor_sessions WHERE expires_at <= ?1",
        params![format_timestamp(&now)],
    )?;
    Ok(deleted)
}
