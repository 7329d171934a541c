//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub sign_in_enabled: bool,
    pub version: &'static str,
}

/// `GET /api/health`: liveness plus whether sign-in is configured.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "ok",
        sign_in_enabled: ctx.core.config().identity_secret.is_some(),
        version: crate::config::APP_VERSION,
    }))
}
