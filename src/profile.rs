//! Doctor credential submission.
//!
//! A doctor submits a license number and a signature image. Submitting (or
//! resubmitting after a rejection) puts the profile back into review.

use std::sync::LazyLock;

use base64::Engine;
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{self, DatabaseError};
use crate::models::UserProfile;
use crate::verification::{self, VerificationSummary};

const MAX_LICENSE_LEN: usize = 64;
const MAX_SIGNATURE_BYTES: usize = 1024 * 1024;

static SIGNATURE_DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:image/(?:png|jpeg|webp|svg\+xml);base64,([A-Za-z0-9+/]+={0,2})$").unwrap()
});

static HTTPS_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Medical License Number is required")]
    LicenseMissing,
    #[error("Medical License Number must be at most {MAX_LICENSE_LEN} characters")]
    LicenseTooLong,
    #[error("Signature is required")]
    SignatureMissing,
    #[error("Signature must be an https URL or a base64 image data URL")]
    SignatureFormat,
    #[error("Signature image exceeds 1 MiB")]
    SignatureTooLarge,
    #[error("Profile not found")]
    NotFound,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsRequest {
    #[serde(default)]
    pub license_no: String,
    #[serde(default)]
    pub signature: String,
}

/// Profile plus its derived verification summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub profile: Option<UserProfile>,
    pub verification: VerificationSummary,
}

impl ProfileView {
    pub fn from_profile(profile: Option<UserProfile>) -> Self {
        let verification = verification::evaluate(profile.as_ref(), false);
        Self {
            profile,
            verification,
        }
    }
}

/// Trimmed license and signature, or the first problem found.
pub fn validate_credentials(request: &CredentialsRequest) -> Result<(String, String), ProfileError> {
    let license = request.license_no.trim();
    if license.is_empty() {
        return Err(ProfileError::LicenseMissing);
    }
    if license.chars().count() > MAX_LICENSE_LEN {
        return Err(ProfileError::LicenseTooLong);
    }

    let signature = request.signature.trim();
    if signature.is_empty() {
        return Err(ProfileError::SignatureMissing);
    }
    validate_signature(signature)?;

    Ok((license.to_string(), signature.to_string()))
}

fn validate_signature(signature: &str) -> Result<(), ProfileError> {
    if HTTPS_URL.is_match(signature) {
        return Ok(());
    }
    let payload = SIGNATURE_DATA_URL
        .captures(signature)
        .and_then(|c| c.get(1))
        .ok_or(ProfileError::SignatureFormat)?
        .as_str();

    // Cheap upper bound before decoding.
    if payload.len() / 4 * 3 > MAX_SIGNATURE_BYTES + 2 {
        return Err(ProfileError::SignatureTooLarge);
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| ProfileError::SignatureFormat)?;
    if bytes.len() > MAX_SIGNATURE_BYTES {
        return Err(ProfileError::SignatureTooLarge);
    }
    Ok(())
}

/// Validate and store credentials, moving the doctor to pending review.
/// This applies to approved doctors as well, who lose gated access until
/// the new credentials are approved.
pub fn submit_credentials(
    conn: &Connection,
    uid: &str,
    request: &CredentialsRequest,
    now: DateTime<Utc>,
) -> Result<ProfileView, ProfileError> {
    let (license, signature) = validate_credentials(request)?;
    if !db::submit_credentials(conn, uid, &license, &signature, now)? {
        return Err(ProfileError::NotFound);
    }
    tracing::info!(doctor_uid = uid, "Doctor submitted credentials for review");
    let profile = db::get_user_profile(conn, uid)?;
    Ok(ProfileView::from_profile(profile))
}
