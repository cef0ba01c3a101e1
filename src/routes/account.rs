//! Programmatic self-deletion with a bearer access token.

use crate::Server;
use crate::error::AppError;
use crate::utils::RequestContext;
use axum::Router;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::delete;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountDeletionResponse {
    /// Always "deleted" on success
    pub status: String,
    /// Email claim from the token, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Delete the authenticated user's account
#[utoipa::path(
    delete,
    path = "/api/account",
    responses(
        (status = 200, description = "Account deleted", body = AccountDeletionResponse),
        (status = 401, description = "Invalid access token", body = crate::routes::ApiErrorResponse),
        (status = 404, description = "User not found", body = crate::routes::ApiErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::routes::ApiErrorResponse),
        (status = 503, description = "API disabled or provider not configured", body = crate::routes::ApiErrorResponse),
    ),
    security(("bearer_auth" = [])),
    tag = "account"
)]
pub async fn delete_account(
    State(server): State<Server>,
    ctx: RequestContext,
    headers: HeaderMap,
) -> Result<Json<AccountDeletionResponse>, AppError> {
    if !server.config.flows.enable_token_api {
        return Err(AppError::Disabled("token deletion API".to_string()));
    }

    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::InvalidToken)?;

    let identity = server.deletion_service.delete_via_token(bearer, &ctx).await?;

    Ok(Json(AccountDeletionResponse {
        status: "deleted".to_string(),
        email: identity.email,
    }))
}

/// Create token deletion API routes
pub fn create_account_routes() -> Router<Server> {
    Router::new().route("/account", delete(delete_account))
}
