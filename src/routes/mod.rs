pub mod account;
pub mod deletion;
pub mod docs;
pub mod health;
pub mod logs;

pub use account::create_account_routes;
pub use deletion::create_deletion_routes;
pub use docs::create_docs_routes;
pub use health::create_health_routes;
pub use logs::create_admin_logs_routes;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standard error response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Stable machine-readable error code
    pub error: String,
    /// Optional human-readable detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
