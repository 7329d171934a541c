use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::VerificationStatus;

/// A doctor account. Identity fields come from sign-in; credential and
/// review fields from profile completion and the admin review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub license_no: Option<String>,
    pub signature: Option<String>,
    pub has_completed_profile: bool,
    pub verification_status: Option<VerificationStatus>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A freshly signed-in doctor with no credentials on file.
    pub fn new_identity(
        uid: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: display_name.into(),
            photo_url: None,
            license_no: None,
            signature: None,
            has_completed_profile: false,
            verification_status: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_license(&self) -> bool {
        is_present(self.license_no.as_deref())
    }

    pub fn has_signature(&self) -> bool {
        is_present(self.signature.as_deref())
    }
}

fn is_present(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Identity fields supplied by the sign-in callback.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorIdentity {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}
