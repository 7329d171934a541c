//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::access_gate::BlockedScreen;
use crate::core_state::CoreError;
use crate::profile::ProfileError;
use crate::registration::{RegistrationError, INVALID_LINK_MESSAGE};

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<BlockedScreen>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    /// Any not-found, expired or used registration link.
    #[error("Registration link rejected")]
    RegistrationLinkInvalid,
    #[error("Doctor verification required ({})", .0.name())]
    VerificationRequired(BlockedScreen),
    #[error("Sign-in is not configured")]
    SignInUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMITED",
                format!("Rate limit exceeded. Retry after {retry_after}s"),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::RegistrationLinkInvalid => (
                StatusCode::BAD_REQUEST,
                "REGISTRATION_LINK_INVALID",
                INVALID_LINK_MESSAGE.to_string(),
            ),
            ApiError::VerificationRequired(screen) => (
                StatusCode::FORBIDDEN,
                "VERIFICATION_REQUIRED",
                match screen {
                    BlockedScreen::Unverified { .. } => {
                        "Submit your license number and signature to continue".to_string()
                    }
                    BlockedScreen::Pending => "Your account is awaiting review".to_string(),
                    BlockedScreen::Rejected { .. } => {
                        "Your verification was rejected. Please resubmit your credentials"
                            .to_string()
                    }
                },
            ),
            ApiError::SignInUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SIGN_IN_UNAVAILABLE",
                "Sign-in is not configured on this server".to_string(),
            ),
        };

        let retry_after = match &self {
            ApiError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        };
        let screen = match self {
            ApiError::VerificationRequired(screen) => Some(screen),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                screen,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(retry_after) = retry_after {
            if let Ok(val) = axum::http::HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::LockPoisoned => ApiError::Internal("lock poisoned".into()),
            CoreError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<RegistrationError> for ApiError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::NotFound
            | RegistrationError::Expired
            | RegistrationError::AlreadyUsed => ApiError::RegistrationLinkInvalid,
            RegistrationError::InvalidSubmission(detail) => ApiError::BadRequest(detail),
            RegistrationError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::NotFound => ApiError::NotFound("Profile not found".into()),
            ProfileError::Database(e) => ApiError::Internal(e.to_string()),
            invalid => ApiError::BadRequest(invalid.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn json_of(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn rate_limited_returns_429_with_retry_after() {
        let response = ApiError::RateLimited { retry_after: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
        assert_eq!(json_of(response).await["error"]["code"], "RATE_LIMITED");
    }

    #[tokio::test]
    async fn token_rejections_share_one_message() {
        for err in [
            RegistrationError::NotFound,
            RegistrationError::Expired,
            RegistrationError::AlreadyUsed,
        ] {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = json_of(response).await;
            assert_eq!(json["error"]["code"], "REGISTRATION_LINK_INVALID");
            assert_eq!(json["error"]["message"], INVALID_LINK_MESSAGE);
        }
    }

    #[tokio::test]
    async fn invalid_submission_is_bad_request() {
        let err = RegistrationError::InvalidSubmission("fullName is required".into());
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "BAD_REQUEST");
        assert_eq!(json["error"]["message"], "fullName is required");
    }

    #[tokio::test]
    async fn verification_required_carries_screen() {
        let response = ApiError::VerificationRequired(BlockedScreen::Rejected {
            reason: Some("Expired license".into()),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = json_of(response).await;
        assert_eq!(json["error"]["code"], "VERIFICATION_REQUIRED");
        assert_eq!(json["error"]["screen"]["screen"], "rejected");
        assert_eq!(json["error"]["screen"]["reason"], "Expired license");
    }

    #[tokio::test]
    async fn credential_problems_are_bad_requests() {
        let response = ApiError::from(ProfileError::LicenseMissing).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "Medical License Number is required");

        let response = ApiError::from(ProfileError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sign_in_unavailable_returns_503() {
        let response = ApiError::SignInUnavailable.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let response = ApiError::Internal("something broke".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = json_of(response).await;
        assert_eq!(json["error"]["message"], "An internal error occurred");
        assert!(json["error"].get("screen").is_none());
    }

    #[tokio::test]
    async fn core_lock_error_maps_to_internal() {
        let response = ApiError::from(CoreError::LockPoisoned).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
