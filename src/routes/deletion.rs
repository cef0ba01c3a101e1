//! Public two-step deletion flow.

use crate::Server;
use crate::deletion::DeletionResult;
use crate::error::AppError;
use crate::utils::RequestContext;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestDeletionBody {
    /// Account email address
    pub email: String,
    /// Preferred language for the confirmation email ("en" or "de")
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestDeletionResponse {
    pub success: bool,
    pub message: String,
    /// Whether the client should now present the code entry form
    pub show_code_input: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmDeletionBody {
    pub email: String,
    /// Six-digit confirmation code from the email
    pub code: String,
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmDeletionResponse {
    pub success: bool,
    pub message: String,
    /// True once the account is gone from the identity provider
    pub deleted: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConfirmLinkQuery {
    pub email: String,
    pub code: String,
    /// Anti-forgery signature from the emailed link
    pub token: String,
    pub language: Option<String>,
}

fn language<'a>(server: &'a Server, requested: Option<&'a str>) -> &'a str {
    requested.unwrap_or(&server.config.email.default_language)
}

fn result_status(result: &DeletionResult) -> StatusCode {
    match &result.error {
        None => StatusCode::OK,
        Some(code) => code.to_app_error().status_code(),
    }
}

fn check_public_flow(server: &Server) -> Result<(), AppError> {
    if server.config.flows.enable_public_flow {
        Ok(())
    } else {
        Err(AppError::Disabled("public deletion flow".to_string()))
    }
}

/// Request account deletion by email
#[utoipa::path(
    post,
    path = "/deletion/request",
    request_body = RequestDeletionBody,
    responses(
        (status = 200, description = "Confirmation email sent", body = RequestDeletionResponse),
        (status = 400, description = "Invalid email address", body = RequestDeletionResponse),
        (status = 503, description = "Flow disabled", body = crate::routes::ApiErrorResponse),
    ),
    tag = "deletion"
)]
pub async fn request_deletion(
    State(server): State<Server>,
    ctx: RequestContext,
    Json(body): Json<RequestDeletionBody>,
) -> Result<Response, AppError> {
    check_public_flow(&server)?;

    let lang = language(&server, body.language.as_deref());
    let result = server
        .deletion_service
        .request_deletion(&body.email, lang, &ctx)
        .await;

    let status = result_status(&result);
    let response = RequestDeletionResponse {
        success: result.success,
        message: result.message,
        show_code_input: result.success,
    };
    Ok((status, Json(response)).into_response())
}

/// Confirm deletion with the emailed code
#[utoipa::path(
    post,
    path = "/deletion/confirm",
    request_body = ConfirmDeletionBody,
    responses(
        (status = 200, description = "Account deleted", body = ConfirmDeletionResponse),
        (status = 410, description = "Invalid or expired code", body = ConfirmDeletionResponse),
        (status = 404, description = "No matching account", body = ConfirmDeletionResponse),
        (status = 503, description = "Flow disabled", body = crate::routes::ApiErrorResponse),
    ),
    tag = "deletion"
)]
pub async fn confirm_deletion(
    State(server): State<Server>,
    ctx: RequestContext,
    Json(body): Json<ConfirmDeletionBody>,
) -> Result<Response, AppError> {
    check_public_flow(&server)?;

    let lang = language(&server, body.language.as_deref());
    let result = server
        .deletion_service
        .confirm_deletion(&body.email, &body.code, lang, &ctx)
        .await;

    let status = result_status(&result);
    let response = ConfirmDeletionResponse {
        success: result.success,
        message: result.message,
        deleted: result.success,
    };
    Ok((status, Json(response)).into_response())
}

/// Confirm deletion via the emailed one-shot link
#[utoipa::path(
    get,
    path = "/deletion/confirm",
    params(ConfirmLinkQuery),
    responses(
        (status = 200, description = "Account deleted", content_type = "text/html"),
        (status = 400, description = "Bad link signature", content_type = "text/html"),
        (status = 410, description = "Invalid or expired code", content_type = "text/html"),
        (status = 500, description = "Deletion failed downstream", content_type = "text/html"),
    ),
    tag = "deletion"
)]
pub async fn confirm_deletion_link(
    State(server): State<Server>,
    ctx: RequestContext,
    Query(query): Query<ConfirmLinkQuery>,
) -> Result<Response, AppError> {
    check_public_flow(&server)?;

    let lang = language(&server, query.language.as_deref());
    let result = server
        .deletion_service
        .confirm_deletion_link(&query.email, &query.code, &query.token, lang, &ctx)
        .await;

    let status = result_status(&result);
    Ok((status, Html(render_result_page(&result))).into_response())
}

fn render_result_page(result: &DeletionResult) -> String {
    let (heading, color) = if result.success {
        ("Account Deleted", "#2e7d32")
    } else {
        ("Request Failed", "#c62828")
    };
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"UTF-8\"><title>{heading}</title></head>\n\
         <body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 40px auto;\">\n\
         <h1 style=\"color: {color};\">{heading}</h1>\n\
         <p>{}</p>\n</body>\n</html>",
        result.message
    )
}

/// Create public deletion flow routes
pub fn create_deletion_routes() -> Router<Server> {
    Router::new()
        .route("/request", post(request_deletion))
        .route(
            "/confirm",
            post(confirm_deletion).get(confirm_deletion_link),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_result_page() {
        let page = render_result_page(&DeletionResult {
            success: true,
            message: "Done.".to_string(),
            error: None,
            keycloak_user_id: None,
        });
        assert!(page.contains("Account Deleted"));
        assert!(page.contains("Done."));
    }
}
