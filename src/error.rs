use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::database::DatabaseError;

/// Application-level error with a stable machine-readable code on the wire.
///
/// The taxonomy variants map one-to-one to the deletion error codes surfaced
/// by the token API; callers never see underlying transport messages.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid or expired confirmation code")]
    InvalidOrExpiredCode,
    #[error("identity provider not configured")]
    NotConfigured,
    #[error("user not found")]
    UserNotFound,
    #[error("failed to authenticate with identity provider")]
    AuthFailed,
    #[error("identity provider error: {0}")]
    IdpError(String),
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("invalid access token")]
    InvalidToken,
    #[error("endpoint disabled: {0}")]
    Disabled(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable code included in JSON error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidEmail => "invalid_email",
            AppError::InvalidOrExpiredCode => "invalid_or_expired_code",
            AppError::NotConfigured => "not_configured",
            AppError::UserNotFound => "user_not_found",
            AppError::AuthFailed => "auth_failed",
            AppError::IdpError(_) => "idp_error",
            AppError::RateLimited => "rate_limited",
            AppError::InvalidToken => "invalid_token",
            AppError::Disabled(_) => "api_disabled",
            AppError::BadRequest(_) => "bad_request",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Database(_) => "internal_error",
            AppError::Config(_) => "internal_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidEmail => StatusCode::BAD_REQUEST,
            AppError::InvalidOrExpiredCode => StatusCode::GONE,
            AppError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UserNotFound => StatusCode::NOT_FOUND,
            AppError::AuthFailed => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IdpError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Disabled(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Variants whose display text is safe to include in a response body.
    fn exposes_message(&self) -> bool {
        matches!(
            self,
            AppError::BadRequest(_)
                | AppError::Unauthorized(_)
                | AppError::Forbidden(_)
                | AppError::NotFound(_)
                | AppError::Disabled(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if self.exposes_message() {
            json!({ "error": self.error_code(), "message": self.to_string() })
        } else {
            json!({ "error": self.error_code() })
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            AppError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::UserNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RateLimited.into_response().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::NotConfigured.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::AuthFailed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InvalidOrExpiredCode.into_response().status(),
            StatusCode::GONE
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AppError::InvalidToken.error_code(), "invalid_token");
        assert_eq!(AppError::RateLimited.error_code(), "rate_limited");
        assert_eq!(
            AppError::IdpError("timeout".to_string()).error_code(),
            "idp_error"
        );
        // Internal detail never leaks through the code
        assert_eq!(
            AppError::Internal("connection reset".to_string()).error_code(),
            "internal_error"
        );
    }

    #[tokio::test]
    async fn test_taxonomy_body_hides_detail() {
        let response = AppError::IdpError("secret upstream detail".to_string()).into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "idp_error");
        assert!(value.get("message").is_none());
    }
}
