use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::PatientSource;

const MAX_TEXT_LEN: usize = 500;
const MAX_HISTORY_LEN: usize = 5_000;
const MAX_AGE: u32 = 150;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub doctor_uid: String,
    pub full_name: String,
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub address: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub medical_history: Option<String>,
    pub source: PatientSource,
    pub registration_token_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    /// Build the stored record. `doctor_uid` is always supplied by the
    /// server, never read from the submission.
    pub fn from_submission(
        submission: PatientSubmission,
        doctor_uid: String,
        source: PatientSource,
        registration_token_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_uid,
            full_name: submission.full_name,
            age: submission.age,
            sex: submission.sex,
            address: submission.address,
            contact_number: submission.contact_number,
            email: submission.email,
            medical_history: submission.medical_history,
            source,
            registration_token_id,
            created_at: now,
        }
    }
}

/// Intake form body. Unknown fields (including any doctor identifier a
/// client might add) are ignored by deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSubmission {
    pub full_name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub medical_history: Option<String>,
}

impl PatientSubmission {
    /// Trim every field, drop blank optionals, enforce limits.
    pub fn normalize(self) -> Result<Self, String> {
        let full_name = self.full_name.trim().to_string();
        if full_name.is_empty() {
            return Err("Full name is required".into());
        }
        if full_name.chars().count() > MAX_TEXT_LEN {
            return Err("Full name is too long".into());
        }
        if let Some(age) = self.age {
            if age > MAX_AGE {
                return Err(format!("Age must be at most {MAX_AGE}"));
            }
        }

        Ok(Self {
            full_name,
            age: self.age,
            sex: clean("Sex", self.sex, MAX_TEXT_LEN)?,
            address: clean("Address", self.address, MAX_TEXT_LEN)?,
            contact_number: clean("Contact number", self.contact_number, MAX_TEXT_LEN)?,
            email: clean("Email", self.email, MAX_TEXT_LEN)?,
            medical_history: clean("Medical history", self.medical_history, MAX_HISTORY_LEN)?,
        })
    }
}

fn clean(label: &str, value: Option<String>, max: usize) -> Result<Option<String>, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if v.chars().count() > max => Err(format!("{label} is too long")),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_drops_blanks() {
        let submission = PatientSubmission {
            full_name: "  Maria Santos ".into(),
            age: Some(42),
            sex: Some("   ".into()),
            address: Some(" 12 Rizal St ".into()),
            ..Default::default()
        };
        let clean = submission.normalize().unwrap();
        assert_eq!(clean.full_name, "Maria Santos");
        assert_eq!(clean.sex, None);
        assert_eq!(clean.address.as_deref(), Some("12 Rizal St"));
    }

    #[test]
    fn normalize_requires_name() {
        let err = PatientSubmission {
            full_name: "   ".into(),
            ..Default::default()
        }
        .normalize()
        .unwrap_err();
        assert!(err.contains("Full name"));
    }

    #[test]
    fn normalize_rejects_implausible_age() {
        let err = PatientSubmission {
            full_name: "Juan".into(),
            age: Some(200),
            ..Default::default()
        }
        .normalize()
        .unwrap_err();
        assert!(err.contains("Age"));
    }

    #[test]
    fn normalize_caps_history_length() {
        let err = PatientSubmission {
            full_name: "Juan".into(),
            medical_history: Some("x".repeat(MAX_HISTORY_LEN + 1)),
            ..Default::default()
        }
        .normalize()
        .unwrap_err();
        assert!(err.contains("Medical history"));
    }

    #[test]
    fn submission_ignores_client_doctor_field() {
        let submission: PatientSubmission = serde_json::from_str(
            r#"{"fullName":"Ana","doctorUid":"forged-doctor","doctorId":"also-forged"}"#,
        )
        .unwrap();
        assert_eq!(submission.full_name, "Ana");
    }
}
