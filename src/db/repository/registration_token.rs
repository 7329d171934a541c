use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::*;

const TOKEN_COLUMNS: &str = "id, doctor_uid, created_at, expires_at, used, used_at";

struct TokenRow {
    id: String,
    doctor_uid: String,
    created_at: String,
    expires_at: String,
    used: bool,
    used_at: Option<String>,
}

impl TokenRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            doctor_uid: row.get(1)?,
            created_at: row.get(2)?,
            expires_at: row.get(3)?,
            used: row.get::<_, i32>(4)? != 0,
            used_at: row.get(5)?,
        })
    }

    fn into_token(self) -> Result<RegistrationToken, DatabaseError> {
        Ok(RegistrationToken {
            created_at: parse_timestamp("registration_tokens.created_at", &self.created_at)?,
            expires_at: parse_timestamp("registration_tokens.expires_at", &self.expires_at)?,
            used_at: self
                .used_at
                .as_deref()
                .map(|ts| parse_timestamp("registration_tokens.used_at", ts))
                .transpose()?,
            id: self.id,
            doctor_uid: self.doctor_uid,
            used: self.used,
        })
    }
}

pub fn insert_registration_token(
    conn: &Connection,
    token: &RegistrationToken,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO registration_tokens (id, doctor_uid, created_at, expires_at, used, used_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            token.id,
            token.doctor_uid,
            format_timestamp(&token.created_at),
            format_timestamp(&token.expires_at),
            token.used as i32,
            token.used_at.as_ref().map(format_timestamp),
        ],
    )?;
    Ok(())
}

pub fn get_registration_token(
    conn: &Connection,
    id: &str,
) -> Result<Option<RegistrationToken>, DatabaseError> {
    let sql = format!("SELECT {TOKEN_COLUMNS} FROM registration_tokens WHERE id = ?1");
    let row = conn
        .query_row(&sql, params![id], TokenRow::from_row)
        .optional()?;
    row.map(TokenRow::into_token).transpose()
}

/// Compare-and-set: flip `used` only if the token is still unused and
/// unexpired at `now`. Returns `true` for the single caller that wins.
pub fn mark_token_used_if_consumable(
    conn: &Connection,
    id: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let ts = format_timestamp(&now);
    let updated = conn.execute(
        "UPDATE registration_tokens SET used = 1, used_at = ?2
         WHERE id = ?1 AND used = 0 AND expires_at > ?2",
        params![id, ts],
    )?;
    Ok(updated == 1)
}

/// Unused, unexpired tokens for a doctor, newest first.
pub fn list_active_tokens_for_doctor(
    conn: &Connection,
    doctor_uid: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RegistrationToken>, DatabaseError> {
    let sql = format!(
        "SELECT {TOKEN_COLUMNS} FROM registration_tokens
         WHERE doctor_uid = ?1 AND used = 0 AND expires_at > ?2
         ORDER BY created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![doctor_uid, format_timestamp(&now)], TokenRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(TokenRow::into_token).collect()
}
