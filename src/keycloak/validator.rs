//! Bearer token validation against the realm's userinfo endpoint.

use super::KeycloakError;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Identity extracted from a successfully validated access token.
///
/// Userinfo responses must carry at least one of `sub` and `email`.
#[derive(Debug, Clone)]
pub struct TokenIdentity {
    pub subject: Option<String>,
    pub email: Option<String>,
}

impl TokenIdentity {
    /// Email when the token carries one, otherwise a synthetic identity
    /// derived from the subject. Used for audit entries.
    pub fn display_identity(&self) -> String {
        if let Some(email) = &self.email {
            return email.clone();
        }
        format!("user_{}", self.subject.as_deref().unwrap_or("unknown"))
    }
}

#[derive(Debug, Deserialize)]
struct UserinfoResponse {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Validates end-user access tokens by asking Keycloak directly.
///
/// Introspection via userinfo keeps signature verification and key rotation
/// on the identity provider's side.
pub struct TokenValidator {
    http_client: Client,
    userinfo_url: String,
}

impl TokenValidator {
    pub fn new(base_url: &str, realm: &str) -> Result<Self, KeycloakError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let userinfo_url = format!("{base_url}/realms/{realm}/protocol/openid-connect/userinfo");
        Ok(Self {
            http_client,
            userinfo_url,
        })
    }

    /// Cheap structural check before any network round trip: three non-empty
    /// dot-separated segments.
    pub fn has_jwt_shape(token: &str) -> bool {
        let segments: Vec<&str> = token.split('.').collect();
        segments.len() == 3 && segments.iter().all(|s| !s.is_empty())
    }

    pub async fn validate(&self, token: &str) -> Result<TokenIdentity, KeycloakError> {
        if !Self::has_jwt_shape(token) {
            return Err(KeycloakError::AuthFailed);
        }

        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!(status = %status, "Userinfo rejected token");
            return Err(KeycloakError::AuthFailed);
        }
        if !status.is_success() {
            return Err(KeycloakError::UnexpectedResponse(format!(
                "userinfo returned {status}"
            )));
        }

        let info: UserinfoResponse = response.json().await?;
        let identity = TokenIdentity {
            subject: info.sub.filter(|s| !s.is_empty()),
            email: info.email.filter(|e| !e.is_empty()),
        };
        if identity.subject.is_none() && identity.email.is_none() {
            return Err(KeycloakError::AuthFailed);
        }

        Ok(identity)
    }
}
