//! `GET /api/access?route=/patients`: gate decision for a front-end route.
//!
//! Public so the front-end can ask before it has a session; a bearer token,
//! when present, decides the signed-in state.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::access_gate::{self, AuthState, GateDecision, ProfileLookup};
use crate::api::error::ApiError;
use crate::api::types::{bearer_token, hash_token, ApiContext};
use crate::db;
use crate::sessions;

#[derive(Deserialize)]
pub struct AccessQuery {
    pub route: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub route: String,
    pub public: bool,
    pub require_verification: bool,
    #[serde(flatten)]
    pub decision: GateDecision,
}

pub async fn decide(
    State(ctx): State<ApiContext>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>, ApiError> {
    if access_gate::is_public_route(&query.route) {
        return Ok(Json(AccessResponse {
            route: query.route,
            public: true,
            require_verification: false,
            decision: GateDecision::Render,
        }));
    }

    let route = access_gate::find_route(&query.route)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown route {}", query.route)))?;

    let session_hash = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(hash_token);

    let decision = {
        let now = ctx.core.now();
        let conn = ctx.core.lock_db()?;
        let uid = match session_hash {
            Some(hash) => sessions::resolve(&conn, &hash, now)?,
            None => None,
        };
        match uid {
            None => access_gate::decide(
                &AuthState::SignedOut,
                route.require_verification,
                ProfileLookup::Loaded(None),
            ),
            Some(uid) => {
                let profile = if route.require_verification {
                    db::get_user_profile(&conn, &uid)?
                } else {
                    None
                };
                access_gate::decide(
                    &AuthState::SignedIn(uid),
                    route.require_verification,
                    ProfileLookup::Loaded(profile.as_ref()),
                )
            }
        }
    };

    Ok(Json(AccessResponse {
        route: route.path.to_string(),
        public: false,
        require_verification: route.require_verification,
        decision,
    }))
}
