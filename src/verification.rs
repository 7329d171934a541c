//! Doctor verification status, derived from stored profile fields.
//!
//! `evaluate` is a pure function: the same profile always yields the same
//! summary. Review outcomes are written elsewhere; this only reads them.

use serde::Serialize;

use crate::models::{UserProfile, VerificationStatus};

pub const MISSING_PROFILE: &str = "profile";
pub const MISSING_LICENSE: &str = "Medical License Number";
pub const MISSING_SIGNATURE: &str = "Signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    Unverified,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSummary {
    pub state: VerificationState,
    /// Transient. While set, `state` is not a real classification.
    pub is_loading: bool,
    pub is_verified: bool,
    pub is_pending: bool,
    pub is_rejected: bool,
    pub missing_fields: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl VerificationSummary {
    fn with_state(state: VerificationState) -> Self {
        Self {
            state,
            is_loading: false,
            is_verified: state == VerificationState::Approved,
            is_pending: state == VerificationState::Pending,
            is_rejected: state == VerificationState::Rejected,
            missing_fields: Vec::new(),
            rejection_reason: None,
        }
    }

    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::with_state(VerificationState::Unverified)
        }
    }
}

/// Classify a doctor profile.
///
/// Precedence: approved, rejected, pending with complete credentials, then
/// no status with complete credentials (older records, treated as pending).
/// Everything else is unverified.
pub fn evaluate(profile: Option<&UserProfile>, loading: bool) -> VerificationSummary {
    if loading {
        return VerificationSummary::loading();
    }

    let Some(profile) = profile else {
        let mut summary = VerificationSummary::with_state(VerificationState::Unverified);
        summary.missing_fields.push(MISSING_PROFILE);
        return summary;
    };

    let has_license = profile.has_license();
    let has_signature = profile.has_signature();
    let complete = has_license && has_signature;

    let state = match profile.verification_status {
        Some(VerificationStatus::Approved) => VerificationState::Approved,
        Some(VerificationStatus::Rejected) => VerificationState::Rejected,
        Some(VerificationStatus::Pending) if complete => VerificationState::Pending,
        None if complete => VerificationState::Pending,
        _ => VerificationState::Unverified,
    };

    let mut summary = VerificationSummary::with_state(state);
    if !has_license {
        summary.missing_fields.push(MISSING_LICENSE);
    }
    if !has_signature {
        summary.missing_fields.push(MISSING_SIGNATURE);
    }
    if state == VerificationState::Rejected {
        summary.rejection_reason = profile.rejection_reason.clone();
    }
    summary
}
