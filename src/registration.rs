//! Patient self-registration links.
//!
//! A signed-in doctor issues a link (`/register-patient/{token}`) that a
//! patient opens without signing in:
//! 1. `issue` stores a random token bound to the doctor, valid 15 minutes
//! 2. `validate` checks it on page load (repeatable, no side effects)
//! 3. `consume` marks it used and creates the patient in one transaction
//!
//! The patient record always takes its doctor from the stored token.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use crate::api::types::generate_token;
use crate::config::REGISTRATION_TOKEN_TTL_MINUTES;
use crate::db::{self, DatabaseError};
use crate::models::{Patient, PatientSource, PatientSubmission, RegistrationToken};

/// The only message a patient ever sees for a rejected link.
pub const INVALID_LINK_MESSAGE: &str =
    "Invalid or expired registration link. Please contact your doctor.";

/// Ids longer than this cannot have been issued here.
const MAX_TOKEN_ID_LEN: usize = 128;

// ═══════════════════════════════════════════════════════════
// Error type
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Registration token not found")]
    NotFound,
    #[error("Registration token expired")]
    Expired,
    #[error("Registration token already used")]
    AlreadyUsed,
    #[error("Invalid patient data: {0}")]
    InvalidSubmission(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for RegistrationError {
    fn from(err: rusqlite::Error) -> Self {
        RegistrationError::Database(DatabaseError::Sqlite(err))
    }
}

impl RegistrationError {
    /// Token-level rejections, all shown to the patient as one message.
    pub fn is_link_rejection(&self) -> bool {
        matches!(
            self,
            RegistrationError::NotFound | RegistrationError::Expired | RegistrationError::AlreadyUsed
        )
    }

    /// Stable label for logs and the audit trail.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistrationError::NotFound => "token_not_found",
            RegistrationError::Expired => "token_expired",
            RegistrationError::AlreadyUsed => "token_already_used",
            RegistrationError::InvalidSubmission(_) => "invalid_submission",
            RegistrationError::Database(_) => "database",
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Returned to the doctor after issuing a link.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    /// Front-end path to share with the patient.
    pub registration_path: String,
}

/// A token that passed validation at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub token_id: String,
    pub doctor_uid: String,
    pub expires_at: DateTime<Utc>,
}

/// Wire shape of a validation result: `{valid, doctorUid?, error?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl TokenValidation {
    pub fn accepted(token: &ValidatedToken) -> Self {
        Self {
            valid: true,
            doctor_uid: Some(token.doctor_uid.clone()),
            expires_at: Some(token.expires_at),
            error: None,
        }
    }

    /// Same body for not-found, expired and used links.
    pub fn rejected() -> Self {
        Self {
            valid: false,
            doctor_uid: None,
            expires_at: None,
            error: Some(INVALID_LINK_MESSAGE),
        }
    }
}

pub fn registration_path(token_id: &str) -> String {
    format!("/register-patient/{token_id}")
}

pub fn token_ttl() -> Duration {
    Duration::minutes(REGISTRATION_TOKEN_TTL_MINUTES)
}

// ═══════════════════════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════════════════════

/// Issue a new link for `doctor_uid`. Earlier links stay valid until they
/// expire or are used.
pub fn issue(
    conn: &Connection,
    doctor_uid: &str,
    now: DateTime<Utc>,
) -> Result<IssuedToken, RegistrationError> {
    let token = RegistrationToken {
        id: generate_token(),
        doctor_uid: doctor_uid.to_string(),
        created_at: now,
        expires_at: now + token_ttl(),
        used: false,
        used_at: None,
    };
    db::insert_registration_token(conn, &token)?;

    tracing::info!(doctor_uid, expires_at = %token.expires_at, "Registration link issued");

    Ok(IssuedToken {
        registration_path: registration_path(&token.id),
        token_id: token.id,
        expires_at: token.expires_at,
    })
}

/// Check a link without consuming it.
pub fn validate(
    conn: &Connection,
    token_id: &str,
    now: DateTime<Utc>,
) -> Result<ValidatedToken, RegistrationError> {
    let token = lookup(conn, token_id)?.ok_or(RegistrationError::NotFound)?;
    check(&token, now)?;
    Ok(ValidatedToken {
        token_id: token.id,
        doctor_uid: token.doctor_uid,
        expires_at: token.expires_at,
    })
}

/// Create the patient and burn the link, atomically.
///
/// The link is judged before the form, so a dead link is reported as such
/// whatever the submission holds. The conditional update is the only gate:
/// of any number of concurrent callers, exactly one sees it succeed. The
/// patient insert shares its transaction, so a failed insert leaves the
/// link unused.
pub fn consume(
    conn: &Connection,
    token_id: &str,
    submission: PatientSubmission,
    now: DateTime<Utc>,
) -> Result<Uuid, RegistrationError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let token = lookup(&tx, token_id)?.ok_or(RegistrationError::NotFound)?;
    check(&token, now)?;

    let submission = submission
        .normalize()
        .map_err(RegistrationError::InvalidSubmission)?;

    if !db::mark_token_used_if_consumable(&tx, token_id, now)? {
        let current = db::get_registration_token(&tx, token_id)?;
        drop(tx);
        return Err(classify_refusal(current.as_ref(), now));
    }

    let patient = Patient::from_submission(
        submission,
        token.doctor_uid,
        PatientSource::SelfRegistered,
        Some(token.id),
        now,
    );
    db::insert_patient(&tx, &patient)?;
    tx.commit()?;

    tracing::info!(
        doctor_uid = %patient.doctor_uid,
        patient_id = %patient.id,
        "Patient self-registered"
    );

    Ok(patient.id)
}

/// Live links for a doctor's dashboard.
pub fn list_active(
    conn: &Connection,
    doctor_uid: &str,
    now: DateTime<Utc>,
) -> Result<Vec<RegistrationToken>, RegistrationError> {
    Ok(db::list_active_tokens_for_doctor(conn, doctor_uid, now)?)
}

fn lookup(conn: &Connection, token_id: &str) -> Result<Option<RegistrationToken>, RegistrationError> {
    if token_id.is_empty() || token_id.len() > MAX_TOKEN_ID_LEN {
        return Ok(None);
    }
    Ok(db::get_registration_token(conn, token_id)?)
}

/// Expiry is checked before use, matching the order links are reported in.
fn check(token: &RegistrationToken, now: DateTime<Utc>) -> Result<(), RegistrationError> {
    if token.is_expired_at(now) {
        return Err(RegistrationError::Expired);
    }
    if token.used {
        return Err(RegistrationError::AlreadyUsed);
    }
    Ok(())
}

/// Why the compare-and-set refused.
fn classify_refusal(token: Option<&RegistrationToken>, now: DateTime<Utc>) -> RegistrationError {
    match token {
        None => RegistrationError::NotFound,
        Some(token) => match check(token, now) {
            Err(err) => err,
            // Consumable now but refused a moment ago: another caller won.
            Ok(()) => RegistrationError::AlreadyUsed,
        },
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
