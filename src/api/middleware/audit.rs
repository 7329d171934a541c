//! Audit logging middleware.
//!
//! Logs every API request with the doctor uid (when signed in), method,
//! route template, and response status. Runs innermost, after auth.
//! Path parameters such as registration link ids never reach the log.

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::{ApiContext, DoctorContext};
use crate::core_state::AccessSource;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let ctx = req.extensions().get::<ApiContext>().cloned();

    let source = req
        .extensions()
        .get::<DoctorContext>()
        .map(|d| AccessSource::Doctor { uid: d.uid.clone() })
        .unwrap_or(AccessSource::Anonymous);

    let response = next.run(req).await;

    if let Some(ctx) = ctx {
        let status = response.status().as_u16();
        ctx.core
            .log_access(source, &format!("{method} {path}"), &format!("status:{status}"));
    }

    response
}
