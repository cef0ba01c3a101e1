//! OpenAPI document for the whole HTTP surface.

use crate::Server;
use axum::Router;
use axum::response::Json;
use axum::routing::get;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "GDPR Deletion Service API",
        version = "0.1.0",
        description = "Email-verified and token-based account deletion against a Keycloak realm"
    ),
    paths(
        crate::routes::health::health_check,
        crate::routes::deletion::request_deletion,
        crate::routes::deletion::confirm_deletion,
        crate::routes::deletion::confirm_deletion_link,
        crate::routes::account::delete_account,
        crate::routes::logs::list_logs,
        crate::routes::logs::statistics,
        crate::routes::logs::export_logs,
        crate::routes::logs::cleanup_logs,
        crate::routes::logs::delete_logs,
        crate::routes::logs::delete_log,
    ),
    components(
        schemas(
            crate::routes::ApiErrorResponse,
            crate::routes::health::HealthResponse,
            crate::routes::deletion::RequestDeletionBody,
            crate::routes::deletion::RequestDeletionResponse,
            crate::routes::deletion::ConfirmDeletionBody,
            crate::routes::deletion::ConfirmDeletionResponse,
            crate::routes::account::AccountDeletionResponse,
            crate::routes::logs::LogsResponse,
            crate::routes::logs::CleanupRequest,
            crate::routes::logs::DeleteLogsRequest,
            crate::routes::logs::DeletedResponse,
            crate::database::entities::deletion_logs::Model,
            crate::database::entities::LogAction,
            crate::database::entities::LogStatus,
            crate::database::LogQueryParams,
            crate::database::LogStatistics,
            crate::database::TrendBucket,
            crate::database::StatsPeriod,
        )
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "deletion", description = "Public two-step deletion flow"),
        (name = "account", description = "Token-based self deletion"),
        (name = "admin-logs", description = "Admin audit log operations"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        // End-user access tokens on the account endpoint
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        // Static admin key on the log API
        components.add_security_scheme(
            "admin_key",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create documentation routes
pub fn create_docs_routes() -> Router<Server> {
    Router::new().route("/docs/openapi.json", get(openapi_json))
}
