//! Verification gate for doctor-only API routes.
//!
//! Runs after auth. Applies the same decision the front-end gets from
//! `GET /api/access`, so a blocked doctor cannot reach gated data directly.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::access_gate::{self, AuthState, GateDecision, ProfileLookup};
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::db;

pub async fn require_verification(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_verification_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_verification_inner(
    req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let doctor = req
        .extensions()
        .get::<DoctorContext>()
        .cloned()
        .ok_or(ApiError::Unauthorized)?;

    let decision = {
        let conn = ctx.core.lock_db()?;
        let profile = db::get_user_profile(&conn, &doctor.uid)?;
        access_gate::decide(
            &AuthState::SignedIn(doctor.uid.clone()),
            true,
            ProfileLookup::Loaded(profile.as_ref()),
        )
    };

    match decision {
        GateDecision::Render => Ok(next.run(req).await),
        GateDecision::Blocked(screen) => {
            tracing::info!(doctor_uid = %doctor.uid, screen = screen.name(), "Verification gate blocked request");
            Err(ApiError::VerificationRequired(screen))
        }
        GateDecision::RedirectToSignIn { .. } => Err(ApiError::Unauthorized),
        GateDecision::Loading => Err(ApiError::Internal("profile lookup incomplete".into())),
    }
}
