use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::*;

const USER_COLUMNS: &str = "uid, email, display_name, photo_url, license_no, signature,
     has_completed_profile, verification_status, rejection_reason, created_at, updated_at";

/// Raw row, converted outside the rusqlite closure so enum and
/// timestamp parse errors surface as `DatabaseError`.
struct UserRow {
    uid: String,
    email: String,
    display_name: String,
    photo_url: Option<String>,
    license_no: Option<String>,
    signature: Option<String>,
    has_completed_profile: bool,
    verification_status: Option<String>,
    rejection_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uid: row.get(0)?,
            email: row.get(1)?,
            display_name: row.get(2)?,
            photo_url: row.get(3)?,
            license_no: row.get(4)?,
            signature: row.get(5)?,
            has_completed_profile: row.get::<_, i32>(6)? != 0,
            verification_status: row.get(7)?,
            rejection_reason: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_profile(self) -> Result<UserProfile, DatabaseError> {
        let verification_status = self
            .verification_status
            .as_deref()
            .map(str::parse::<VerificationStatus>)
            .transpose()?;
        Ok(UserProfile {
            uid: self.uid,
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            license_no: self.license_no,
            signature: self.signature,
            has_completed_profile: self.has_completed_profile,
            verification_status,
            rejection_reason: self.rejection_reason,
            created_at: parse_timestamp("users.created_at", &self.created_at)?,
            updated_at: parse_timestamp("users.updated_at", &self.updated_at)?,
        })
    }
}

/// Insert a full profile row (used for fixtures and imports).
pub fn insert_user_profile(conn: &Connection, profile: &UserProfile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (uid, email, display_name, photo_url, license_no, signature,
             has_completed_profile, verification_status, rejection_reason, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            profile.uid,
            profile.email,
            profile.display_name,
            profile.photo_url,
            profile.license_no,
            profile.signature,
            profile.has_completed_profile as i32,
            profile.verification_status.map(|s| s.as_str()),
            profile.rejection_reason,
            format_timestamp(&profile.created_at),
            format_timestamp(&profile.updated_at),
        ],
    )?;
    Ok(())
}

/// Create the doctor on first sign-in, or refresh identity fields on later
/// sign-ins. Credential and review columns are never touched here.
pub fn upsert_user_identity(
    conn: &Connection,
    identity: &DoctorIdentity,
    now: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let ts = format_timestamp(&now);
    conn.execute(
        "INSERT INTO users (uid, email, display_name, photo_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(uid) DO UPDATE SET
             email = excluded.email,
             display_name = excluded.display_name,
             photo_url = excluded.photo_url,
             updated_at = excluded.updated_at",
        params![identity.uid, identity.email, identity.display_name, identity.photo_url, ts],
    )?;
    Ok(())
}

pub fn get_user_profile(conn: &Connection, uid: &str) -> Result<Option<UserProfile>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uid = ?1");
    let row = conn
        .query_row(&sql, params![uid], UserRow::from_row)
        .optional()?;
    row.map(UserRow::into_profile).transpose()
}

/// Store license and signature and put the profile into review.
/// Clears a previous rejection reason, so this doubles as resubmission.
/// An approved doctor who changes credentials goes back to pending too:
/// new credentials are never trusted without review.
/// Returns `false` when the uid is unknown.
pub fn submit_credentials(
    conn: &Connection,
    uid: &str,
    license_no: &str,
    signature: &str,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET
             license_no = ?2,
             signature = ?3,
             has_completed_profile = 1,
             verification_status = 'pending',
             rejection_reason = NULL,
             updated_at = ?4
         WHERE uid = ?1",
        params![uid, license_no, signature, format_timestamp(&now)],
    )?;
    Ok(updated > 0)
}

/// Record an admin review outcome. The reason is kept only for rejections.
pub fn set_verification_status(
    conn: &Connection,
    uid: &str,
    status: VerificationStatus,
    rejection_reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let reason = match status {
        VerificationStatus::Rejected => rejection_reason,
        _ => None,
    };
    let updated = conn.execute(
        "UPDATE users SET verification_status = ?2, rejection_reason = ?3, updated_at = ?4
         WHERE uid = ?1",
        params![uid, status.as_str(), reason, format_timestamp(&now)],
    )?;
    Ok(updated > 0)
}
