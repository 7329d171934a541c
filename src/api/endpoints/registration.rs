//! Patient self-registration links.
//!
//! Doctor side (bearer + verified):
//! - `POST /api/registration-tokens`: issue a 15-minute link
//! - `GET /api/registration-tokens`: live links
//!
//! Patient side (public):
//! - `GET /api/register-patient/:tokenId`: check a link on page load
//! - `POST /api/register-patient/:tokenId`: submit the intake form

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::core_state::AccessSource;
use crate::db;
use crate::models::{PatientSubmission, RegistrationToken};
use crate::registration::{self, IssuedToken, RegistrationError, TokenValidation};

#[derive(Serialize)]
pub struct ActiveTokensResponse {
    pub tokens: Vec<RegistrationToken>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredResponse {
    pub patient_id: Uuid,
}

pub async fn issue(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
) -> Result<(StatusCode, Json<IssuedToken>), ApiError> {
    let issued = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        registration::issue(&conn, &doctor.uid, now)?
    };
    ctx.core.log_access(
        AccessSource::Doctor { uid: doctor.uid },
        "issue_registration_link",
        "registration_tokens",
    );
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn list_active(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
) -> Result<Json<ActiveTokensResponse>, ApiError> {
    let tokens = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        registration::list_active(&conn, &doctor.uid, now)?
    };
    Ok(Json(ActiveTokensResponse { tokens }))
}

/// Always 200: an unusable link is a normal answer, reported with the
/// generic message and no hint of which check failed.
pub async fn validate(
    State(ctx): State<ApiContext>,
    Path(token_id): Path<String>,
) -> Result<Json<TokenValidation>, ApiError> {
    let result = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        registration::validate(&conn, &token_id, now)
    };

    match result {
        Ok(token) => Ok(Json(TokenValidation::accepted(&token))),
        Err(err) if err.is_link_rejection() => {
            record_rejection(&ctx, "validate_registration_link", &err);
            Ok(Json(TokenValidation::rejected()))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn consume(
    State(ctx): State<ApiContext>,
    Path(token_id): Path<String>,
    Json(submission): Json<PatientSubmission>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    let result = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        registration::consume(&conn, &token_id, submission, now).and_then(|patient_id| {
            let patient = db::get_patient(&conn, &patient_id)?;
            Ok((patient_id, patient.map(|p| p.doctor_uid)))
        })
    };

    match result {
        Ok((patient_id, doctor_uid)) => {
            ctx.core.log_access(
                AccessSource::PatientLink { doctor_uid },
                "consume_registration_link",
                "patients",
            );
            Ok((StatusCode::CREATED, Json(RegisteredResponse { patient_id })))
        }
        Err(err) => {
            if err.is_link_rejection() {
                record_rejection(&ctx, "consume_registration_link", &err);
            }
            Err(err.into())
        }
    }
}

/// The client only ever sees the generic message; the kind goes to the
/// log and the audit trail.
fn record_rejection(ctx: &ApiContext, action: &str, err: &RegistrationError) {
    tracing::warn!(kind = err.kind(), action, "Registration link rejected");
    ctx.core.log_access(
        AccessSource::PatientLink { doctor_uid: None },
        &format!("{action}:{}", err.kind()),
        "registration_tokens",
    );
}
