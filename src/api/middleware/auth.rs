//! Bearer session authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves it to a live doctor
//! session, and injects `DoctorContext` into request extensions for
//! downstream handlers.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{bearer_token, hash_token, ApiContext, DoctorContext};
use crate::sessions;

/// Require a live doctor session.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let session_hash = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(hash_token)
        .ok_or(ApiError::Unauthorized)?;

    let uid = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        sessions::resolve(&conn, &session_hash, now)?
    }; // MutexGuard dropped here, before any .await

    let uid = uid.ok_or_else(|| {
        tracing::debug!("Bearer token did not match a live session");
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(DoctorContext { uid, session_hash });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));

    Ok(response)
}
