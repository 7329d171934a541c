//! Doctor sign-in and sign-out.
//!
//! `POST /api/auth/sign-in` (unprotected): called by the trusted identity
//! callback with `X-Identity-Secret`
//! `POST /api/auth/sign-out` (protected): ends the presented session

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::models::DoctorIdentity;
use crate::sessions::{self, IssuedSession};

pub const IDENTITY_SECRET_HEADER: &str = "X-Identity-Secret";

/// `POST /api/auth/sign-in`: upsert identity and open a session.
pub async fn sign_in(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Json(identity): Json<DoctorIdentity>,
) -> Result<Json<IssuedSession>, ApiError> {
    let expected = ctx
        .core
        .config()
        .identity_secret
        .as_deref()
        .ok_or(ApiError::SignInUnavailable)?;

    let presented = headers
        .get(IDENTITY_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !sessions::secret_matches(presented, expected) {
        tracing::warn!("Sign-in rejected: identity secret mismatch");
        return Err(ApiError::Unauthorized);
    }

    if identity.uid.trim().is_empty() || identity.email.trim().is_empty() {
        return Err(ApiError::BadRequest("uid and email are required".into()));
    }

    let session = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        sessions::sign_in(&conn, &identity, now)?
    };

    Ok(Json(session))
}

/// `POST /api/auth/sign-out`: delete the current session.
pub async fn sign_out(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
) -> Result<StatusCode, ApiError> {
    {
        let conn = ctx.core.lock_db()?;
        sessions::sign_out(&conn, &doctor.session_hash)?;
    }
    tracing::info!(doctor_uid = %doctor.uid, "Doctor signed out");
    Ok(StatusCode::NO_CONTENT)
}
