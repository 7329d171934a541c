//! Doctor profile and credential endpoints.
//!
//! - `GET /api/profile`: profile with verification summary
//! - `GET /api/profile/verification`: summary only
//! - `PUT /api/profile/credentials`: submit or resubmit for review

use axum::extract::State;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::core_state::AccessSource;
use crate::db;
use crate::profile::{self, CredentialsRequest, ProfileView};
use crate::verification::VerificationSummary;

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
) -> Result<Json<ProfileView>, ApiError> {
    let profile = {
        let conn = ctx.core.lock_db()?;
        db::get_user_profile(&conn, &doctor.uid)?
    };
    Ok(Json(ProfileView::from_profile(profile)))
}

pub async fn verification(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
) -> Result<Json<VerificationSummary>, ApiError> {
    let profile = {
        let conn = ctx.core.lock_db()?;
        db::get_user_profile(&conn, &doctor.uid)?
    };
    Ok(Json(ProfileView::from_profile(profile).verification))
}

pub async fn submit_credentials(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<ProfileView>, ApiError> {
    let view = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        profile::submit_credentials(&conn, &doctor.uid, &request, now)?
    };
    ctx.core.log_access(
        AccessSource::Doctor { uid: doctor.uid },
        "submit_credentials",
        "users",
    );
    Ok(Json(view))
}
