//! Bearer-key authentication for the admin log API.

use crate::Server;
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use tracing::warn;

fn hash_key(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

/// Compare a presented key against the configured one. Hashing both sides
/// keeps the comparison length-independent of the secret.
pub fn verify_admin_key(presented: &str, configured: &str) -> bool {
    hash_key(presented) == hash_key(configured)
}

/// Rejects requests unless they carry the configured admin API key. With no
/// key configured the admin surface is unreachable.
pub async fn admin_auth_middleware(
    State(server): State<Server>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(configured) = server.config.admin.api_key.as_deref() else {
        return Err(AppError::Unauthorized(
            "admin API key not configured".to_string(),
        ));
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(key) if verify_admin_key(key, configured) => Ok(next.run(req).await),
        Some(_) => {
            warn!("Admin API key mismatch");
            Err(AppError::Unauthorized("invalid admin API key".to_string()))
        }
        None => Err(AppError::Unauthorized(
            "missing bearer authorization".to_string(),
        )),
    }
}
