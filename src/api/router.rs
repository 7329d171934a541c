//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/` in three groups:
//! - public: rate limit → audit
//! - signed in: rate limit → auth → audit
//! - verified: rate limit → auth → verification gate → audit

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router over shared core state.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext` (custom rate limits).
pub fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers are applied from bottom (innermost) to top (outermost).
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let public = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/access", get(endpoints::access::decide))
        .route("/auth/sign-in", post(endpoints::auth::sign_in))
        .route(
            "/register-patient/:token_id",
            get(endpoints::registration::validate).post(endpoints::registration::consume),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let signed_in = Router::new()
        .route("/auth/sign-out", post(endpoints::auth::sign_out))
        .route("/profile", get(endpoints::profile::get))
        .route("/profile/verification", get(endpoints::profile::verification))
        .route("/profile/credentials", put(endpoints::profile::submit_credentials))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let verified = Router::new()
        .route(
            "/registration-tokens",
            post(endpoints::registration::issue).get(endpoints::registration::list_active),
        )
        .route("/patients", get(endpoints::patients::list))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::gate::require_verification))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(axum::Extension(ctx.clone()));

    let mut app = Router::new()
        .nest("/api", public.merge(signed_in).merge(verified))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(ctx.core.config().allowed_origin.as_deref()) {
        app = app.layer(cors);
    }
    app
}

/// CORS for the browser front-end, when an origin is configured.
fn cors_layer(origin: Option<&str>) -> Option<CorsLayer> {
    let origin = origin?;
    match HeaderValue::from_str(origin) {
        Ok(value) => Some(
            CorsLayer::new()
                .allow_origin(value)
                .allow_methods([Method::GET, Method::POST, Method::PUT])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
        ),
        Err(e) => {
            tracing::warn!(origin, "Ignoring invalid CORS origin: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use chrono::{Duration, TimeZone, Utc};
    use tower::ServiceExt;

    use crate::api::types::RateLimiter;
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::VerificationStatus;
    use crate::registration::INVALID_LINK_MESSAGE;

    const SECRET: &str = "test-identity-secret";

    struct Harness {
        core: Arc<CoreState>,
        clock: ManualClock,
        app: Router,
    }

    fn harness() -> Harness {
        harness_with(Some(SECRET), RateLimiter::new())
    }

    fn harness_with(secret: Option<&str>, limiter: RateLimiter) -> Harness {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap());
        let config = AppConfig {
            identity_secret: secret.map(Into::into),
            allowed_origin: Some("http://localhost:5173".into()),
            ..AppConfig::default()
        };
        let core = Arc::new(CoreState::in_memory(config, Arc::new(clock.clone())).unwrap());
        let app = api_router_with_ctx(ApiContext::with_rate_limiter(core.clone(), limiter));
        Harness { core, clock, app }
    }

    fn make_request(method: &str, uri: &str, token: Option<&str>, body: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    impl Harness {
        async fn send(&self, req: Request<Body>) -> Response {
            self.app.clone().oneshot(req).await.unwrap()
        }

        async fn sign_in(&self, uid: &str) -> String {
            let req = Request::builder()
                .method("POST")
                .uri("/api/auth/sign-in")
                .header("Content-Type", "application/json")
                .header("X-Identity-Secret", SECRET)
                .body(Body::from(format!(
                    r#"{{"uid":"{uid}","email":"{uid}@clinic.example","displayName":"Dr. {uid}"}}"#
                )))
                .unwrap();
            let response = self.send(req).await;
            assert_eq!(response.status(), StatusCode::OK);
            response_json(response).await["token"].as_str().unwrap().to_string()
        }

        fn set_status(&self, uid: &str, status: VerificationStatus, reason: Option<&str>) {
            let conn = self.core.lock_db().unwrap();
            db::set_verification_status(&conn, uid, status, reason, self.core.now()).unwrap();
        }

        async fn approved_doctor(&self, uid: &str) -> String {
            let token = self.sign_in(uid).await;
            self.set_status(uid, VerificationStatus::Approved, None);
            token
        }

        async fn issue_link(&self, token: &str) -> String {
            let response = self
                .send(make_request("POST", "/api/registration-tokens", Some(token), None))
                .await;
            assert_eq!(response.status(), StatusCode::CREATED);
            response_json(response).await["tokenId"].as_str().unwrap().to_string()
        }
    }

    // ── Public routes ───────────────────────────────────────

    #[tokio::test]
    async fn health_is_public() {
        let h = harness();
        let response = h.send(make_request("GET", "/api/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["signInEnabled"], true);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let h = harness();
        let response = h.send(make_request("GET", "/api/nonexistent", None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ── Sign-in ─────────────────────────────────────────────

    #[tokio::test]
    async fn sign_in_requires_identity_secret() {
        let h = harness();
        let body = r#"{"uid":"doc-1","email":"doc-1@clinic.example"}"#;

        let response = h.send(make_request("POST", "/api/auth/sign-in", None, Some(body))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/sign-in")
            .header("Content-Type", "application/json")
            .header("X-Identity-Secret", "wrong")
            .body(Body::from(body))
            .unwrap();
        assert_eq!(h.send(req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn sign_in_disabled_without_secret() {
        let h = harness_with(None, RateLimiter::new());
        let body = r#"{"uid":"doc-1","email":"doc-1@clinic.example"}"#;
        let response = h.send(make_request("POST", "/api/auth/sign-in", None, Some(body))).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response_json(response).await["error"]["code"], "SIGN_IN_UNAVAILABLE");
    }

    #[tokio::test]
    async fn sign_out_ends_session() {
        let h = harness();
        let token = h.sign_in("doc-1").await;

        let response = h.send(make_request("POST", "/api/auth/sign-out", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = h.send(make_request("GET", "/api/profile", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn session_expires_with_clock() {
        let h = harness();
        let token = h.sign_in("doc-1").await;
        h.clock.advance(Duration::hours(25));
        let response = h.send(make_request("GET", "/api/profile", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    // ── Profile ─────────────────────────────────────────────

    #[tokio::test]
    async fn profile_requires_auth() {
        let h = harness();
        let response = h.send(make_request("GET", "/api/profile", None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response_json(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn fresh_profile_lists_missing_credentials() {
        let h = harness();
        let token = h.sign_in("doc-1").await;

        let response = h.send(make_request("GET", "/api/profile", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");
        let json = response_json(response).await;
        assert_eq!(json["profile"]["uid"], "doc-1");
        assert_eq!(json["verification"]["state"], "unverified");
        assert_eq!(
            json["verification"]["missingFields"],
            serde_json::json!(["Medical License Number", "Signature"])
        );
    }

    #[tokio::test]
    async fn credentials_submission_moves_to_pending() {
        let h = harness();
        let token = h.sign_in("doc-1").await;

        let body = r#"{"licenseNo":"PRC-0012345","signature":"data:image/png;base64,iVBORw0KGgo="}"#;
        let response = h
            .send(make_request("PUT", "/api/profile/credentials", Some(&token), Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["verification"]["state"], "pending");
        assert_eq!(json["profile"]["hasCompletedProfile"], true);

        let response = h
            .send(make_request("GET", "/api/profile/verification", Some(&token), None))
            .await;
        assert_eq!(response_json(response).await["isPending"], true);
    }

    #[tokio::test]
    async fn invalid_credentials_are_rejected() {
        let h = harness();
        let token = h.sign_in("doc-1").await;
        let body = r#"{"licenseNo":"PRC-1","signature":"javascript:alert(1)"}"#;
        let response = h
            .send(make_request("PUT", "/api/profile/credentials", Some(&token), Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ── Verification gate ───────────────────────────────────

    #[tokio::test]
    async fn gated_routes_block_per_state() {
        let h = harness();
        let token = h.sign_in("doc-1").await;

        let response = h.send(make_request("GET", "/api/patients", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "VERIFICATION_REQUIRED");
        assert_eq!(json["error"]["screen"]["screen"], "unverified");

        {
            let conn = h.core.lock_db().unwrap();
            db::submit_credentials(&conn, "doc-1", "PRC-1", "https://cdn.example/s.png", h.core.now())
                .unwrap();
        }
        let response = h.send(make_request("GET", "/api/patients", Some(&token), None)).await;
        assert_eq!(response_json(response).await["error"]["screen"]["screen"], "pending");

        h.set_status("doc-1", VerificationStatus::Rejected, Some("License not found in registry"));
        let response = h
            .send(make_request("POST", "/api/registration-tokens", Some(&token), None))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = response_json(response).await;
        assert_eq!(json["error"]["screen"]["screen"], "rejected");
        assert_eq!(json["error"]["screen"]["reason"], "License not found in registry");

        h.set_status("doc-1", VerificationStatus::Approved, None);
        let response = h.send(make_request("GET", "/api/patients", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response_json(response).await["total"], 0);
    }

    #[tokio::test]
    async fn legacy_profile_without_status_sees_pending() {
        let h = harness();
        let token = h.sign_in("doc-1").await;
        {
            let conn = h.core.lock_db().unwrap();
            conn.execute(
                "UPDATE users SET license_no = 'ABC123', signature = 'data:image/png;base64,AAAA'
                 WHERE uid = 'doc-1'",
                [],
            )
            .unwrap();
        }
        let response = h.send(make_request("GET", "/api/patients", Some(&token), None)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response_json(response).await["error"]["screen"]["screen"], "pending");
    }

    // ── Registration links ──────────────────────────────────

    #[tokio::test]
    async fn patient_self_registration_end_to_end() {
        let h = harness();
        let token = h.approved_doctor("doc-1").await;
        let link = h.issue_link(&token).await;

        let uri = format!("/api/register-patient/{link}");
        let response = h.send(make_request("GET", &uri, None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = response_json(response).await;
        assert_eq!(json["valid"], true);
        assert_eq!(json["doctorUid"], "doc-1");

        let form = r#"{"fullName":"Rosa Dela Cruz","age":34,"doctorUid":"doc-attacker"}"#;
        let response = h.send(make_request("POST", &uri, None, Some(form))).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response_json(response).await["patientId"].is_string());

        let response = h.send(make_request("GET", "/api/patients", Some(&token), None)).await;
        let json = response_json(response).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["patients"][0]["fullName"], "Rosa Dela Cruz");
        assert_eq!(json["patients"][0]["doctorUid"], "doc-1");
        assert_eq!(json["patients"][0]["source"], "self_registered");

        // Second submission with the same link
        let response = h.send(make_request("POST", &uri, None, Some(form))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "REGISTRATION_LINK_INVALID");
        assert_eq!(json["error"]["message"], INVALID_LINK_MESSAGE);

        let response = h.send(make_request("GET", &uri, None, None)).await;
        let json = response_json(response).await;
        assert_eq!(json["valid"], false);
        assert_eq!(json["error"], INVALID_LINK_MESSAGE);
    }

    #[tokio::test]
    async fn expired_link_shows_generic_message() {
        let h = harness();
        let token = h.approved_doctor("doc-1").await;
        let link = h.issue_link(&token).await;

        h.clock.advance(Duration::minutes(16));

        let uri = format!("/api/register-patient/{link}");
        let json = response_json(h.send(make_request("GET", &uri, None, None)).await).await;
        assert_eq!(json["valid"], false);
        assert_eq!(json["error"], INVALID_LINK_MESSAGE);
        assert!(json.get("doctorUid").is_none());

        let response = h
            .send(make_request("POST", &uri, None, Some(r#"{"fullName":"Late Patient"}"#)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["message"], INVALID_LINK_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_link_is_indistinguishable() {
        let h = harness();
        let json = response_json(
            h.send(make_request("GET", "/api/register-patient/not-a-real-token", None, None))
                .await,
        )
        .await;
        assert_eq!(json, serde_json::json!({"valid": false, "error": INVALID_LINK_MESSAGE}));
    }

    #[tokio::test]
    async fn blank_name_keeps_link_usable() {
        let h = harness();
        let token = h.approved_doctor("doc-1").await;
        let link = h.issue_link(&token).await;
        let uri = format!("/api/register-patient/{link}");

        let response = h.send(make_request("POST", &uri, None, Some(r#"{"fullName":"  "}"#))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"]["code"], "BAD_REQUEST");

        let json = response_json(h.send(make_request("GET", &uri, None, None)).await).await;
        assert_eq!(json["valid"], true);
    }

    #[tokio::test]
    async fn used_link_with_blank_name_is_link_error() {
        let h = harness();
        let token = h.approved_doctor("doc-1").await;
        let link = h.issue_link(&token).await;
        let uri = format!("/api/register-patient/{link}");
        h.send(make_request("POST", &uri, None, Some(r#"{"fullName":"Ana"}"#))).await;

        let response = h.send(make_request("POST", &uri, None, Some(r#"{"fullName":" "}"#))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = response_json(response).await;
        assert_eq!(json["error"]["code"], "REGISTRATION_LINK_INVALID");
        assert_eq!(json["error"]["message"], INVALID_LINK_MESSAGE);
    }

    #[tokio::test]
    async fn active_links_listed_newest_first() {
        let h = harness();
        let token = h.approved_doctor("doc-1").await;
        let first = h.issue_link(&token).await;
        h.clock.advance(Duration::minutes(1));
        let second = h.issue_link(&token).await;

        let json = response_json(
            h.send(make_request("GET", "/api/registration-tokens", Some(&token), None)).await,
        )
        .await;
        assert_eq!(json["tokens"][0]["id"], second.as_str());
        assert_eq!(json["tokens"][1]["id"], first.as_str());
    }

    #[tokio::test]
    async fn registration_is_audited_with_doctor() {
        let h = harness();
        let token = h.approved_doctor("doc-1").await;
        let link = h.issue_link(&token).await;
        let uri = format!("/api/register-patient/{link}");
        h.send(make_request("POST", &uri, None, Some(r#"{"fullName":"Ana"}"#))).await;
        h.send(make_request("POST", &uri, None, Some(r#"{"fullName":"Ana"}"#))).await;

        let entries = h.core.audit_entries();
        assert!(entries.iter().any(|e| e.action == "consume_registration_link"
            && e.source.doctor_uid() == Some("doc-1")));
        assert!(entries
            .iter()
            .any(|e| e.action == "consume_registration_link:token_already_used"));
        assert!(entries
            .iter()
            .any(|e| e.action == "POST /api/register-patient/:token_id"));
        assert!(entries.iter().all(|e| !e.action.contains(&link)));
    }

    // ── Access decisions ────────────────────────────────────

    #[tokio::test]
    async fn access_decisions() {
        let h = harness();

        let json = response_json(h.send(make_request("GET", "/api/access?route=/patients", None, None)).await).await;
        assert_eq!(json["decision"], "redirectToSignIn");
        assert_eq!(json["to"], "/login");

        let json = response_json(
            h.send(make_request("GET", "/api/access?route=/register-patient/abc", None, None)).await,
        )
        .await;
        assert_eq!(json["public"], true);
        assert_eq!(json["decision"], "render");

        let token = h.sign_in("doc-1").await;
        let json = response_json(
            h.send(make_request("GET", "/api/access?route=/profile", Some(&token), None)).await,
        )
        .await;
        assert_eq!(json["decision"], "render");
        assert_eq!(json["requireVerification"], false);

        let json = response_json(
            h.send(make_request("GET", "/api/access?route=/generate-prescription", Some(&token), None))
                .await,
        )
        .await;
        assert_eq!(json["decision"], "blocked");
        assert_eq!(json["screen"], "unverified");

        h.set_status("doc-1", VerificationStatus::Approved, None);
        let json = response_json(
            h.send(make_request("GET", "/api/access?route=/view-prescriptions", Some(&token), None))
                .await,
        )
        .await;
        assert_eq!(json["decision"], "render");
    }

    #[tokio::test]
    async fn access_unknown_route_is_404() {
        let h = harness();
        let response = h.send(make_request("GET", "/api/access?route=/admin", None, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    // ── Cross-cutting ───────────────────────────────────────

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let h = harness_with(Some(SECRET), RateLimiter::with_limits(2, 1000));
        for _ in 0..2 {
            let response = h.send(make_request("GET", "/api/health", None, None)).await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = h.send(make_request("GET", "/api/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
    }

    #[tokio::test]
    async fn rotating_bearers_share_the_peer_limit() {
        let h = harness_with(Some(SECRET), RateLimiter::with_limits(2, 1000));
        let peer = std::net::SocketAddr::from(([203, 0, 113, 9], 52000));
        let mut limited = 0;
        for i in 0..20 {
            let forged = format!("forged{i:010}xxxxxxxx");
            let mut req = make_request(
                "POST",
                "/api/register-patient/some-link",
                Some(&forged),
                Some(r#"{"fullName":"Ana"}"#),
            );
            req.extensions_mut().insert(axum::extract::ConnectInfo(peer));
            if h.send(req).await.status() == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }
        assert_eq!(limited, 18);
    }

    #[tokio::test]
    async fn cors_preflight_allows_front_end_origin() {
        let h = harness();
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/profile")
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "GET")
            .body(Body::empty())
            .unwrap();
        let response = h.send(req).await;
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:5173"
        );
    }

    #[test]
    fn invalid_cors_origin_is_ignored() {
        assert!(cors_layer(Some("bad\norigin")).is_none());
        assert!(cors_layer(None).is_none());
        assert!(cors_layer(Some("https://app.reseta.example")).is_some());
    }
}
