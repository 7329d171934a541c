//! `GET /api/patients`: the signed-in doctor's patients, newest first.

use axum::extract::State;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DoctorContext};
use crate::db;
use crate::models::Patient;

#[derive(Serialize)]
pub struct PatientsResponse {
    pub patients: Vec<Patient>,
    pub total: usize,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(doctor): Extension<DoctorContext>,
) -> Result<Json<PatientsResponse>, ApiError> {
    let patients = {
        let conn = ctx.core.lock_db()?;
        db::list_patients_for_doctor(&conn, &doctor.uid)?
    };
    Ok(Json(PatientsResponse {
        total: patients.len(),
        patients,
    }))
}
