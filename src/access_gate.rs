//! Route gating: authentication first, then doctor verification.
//!
//! Every protected route resolves to exactly one `GateDecision`.

use serde::Serialize;

use crate::config::SIGN_IN_PATH;
use crate::models::UserProfile;
use crate::verification::{self, VerificationState};

/// Sign-in state of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Loading,
    SignedOut,
    SignedIn(String),
}

/// Profile fetch state for the signed-in doctor.
#[derive(Debug, Clone, Copy)]
pub enum ProfileLookup<'a> {
    Loading,
    Loaded(Option<&'a UserProfile>),
}

/// What a doctor sees instead of a verification-gated page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", rename_all = "camelCase")]
pub enum BlockedScreen {
    /// Prompt to submit credentials.
    #[serde(rename_all = "camelCase")]
    Unverified { missing_fields: Vec<&'static str> },
    /// Awaiting review.
    Pending,
    /// Rejected, with a resubmit affordance.
    Rejected { reason: Option<String> },
}

impl BlockedScreen {
    pub fn name(&self) -> &'static str {
        match self {
            BlockedScreen::Unverified { .. } => "unverified",
            BlockedScreen::Pending => "pending",
            BlockedScreen::Rejected { .. } => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "camelCase")]
pub enum GateDecision {
    Loading,
    RedirectToSignIn { to: &'static str },
    Render,
    Blocked(BlockedScreen),
}

/// A front-end route and whether it needs an approved doctor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedRoute {
    pub path: &'static str,
    pub require_verification: bool,
}

pub const PROTECTED_ROUTES: &[ProtectedRoute] = &[
    ProtectedRoute { path: "/landing", require_verification: true },
    ProtectedRoute { path: "/patients", require_verification: true },
    ProtectedRoute { path: "/create-reseta-template", require_verification: true },
    ProtectedRoute { path: "/generate-prescription", require_verification: true },
    ProtectedRoute { path: "/view-prescriptions", require_verification: true },
    ProtectedRoute { path: "/profile", require_verification: false },
];

/// Look up a protected route. Trailing slashes are ignored.
pub fn find_route(path: &str) -> Option<&'static ProtectedRoute> {
    let trimmed = path.trim_end_matches('/');
    PROTECTED_ROUTES.iter().find(|r| r.path == trimmed)
}

/// `/login` and `/register-patient/{tokenId}`.
pub fn is_public_route(path: &str) -> bool {
    let trimmed = path.trim_end_matches('/');
    trimmed == SIGN_IN_PATH
        || trimmed
            .strip_prefix("/register-patient/")
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
}

pub fn decide(
    auth: &AuthState,
    require_verification: bool,
    profile: ProfileLookup<'_>,
) -> GateDecision {
    match auth {
        AuthState::Loading => return GateDecision::Loading,
        AuthState::SignedOut => return GateDecision::RedirectToSignIn { to: SIGN_IN_PATH },
        AuthState::SignedIn(_) => {}
    }

    if !require_verification {
        return GateDecision::Render;
    }

    let summary = match profile {
        ProfileLookup::Loading => verification::evaluate(None, true),
        ProfileLookup::Loaded(p) => verification::evaluate(p, false),
    };

    if summary.is_loading {
        return GateDecision::Loading;
    }
    if summary.is_verified {
        return GateDecision::Render;
    }

    let screen = match summary.state {
        VerificationState::Pending => BlockedScreen::Pending,
        VerificationState::Rejected => BlockedScreen::Rejected {
            reason: summary.rejection_reason,
        },
        _ => BlockedScreen::Unverified {
            missing_fields: summary.missing_fields,
        },
    };
    GateDecision::Blocked(screen)
}
