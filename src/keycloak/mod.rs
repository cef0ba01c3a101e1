//! Admin-level Keycloak client: token acquisition, user lookup, deletion.

pub mod validator;

pub use validator::{TokenIdentity, TokenValidator};

use crate::config::KeycloakConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const TOKEN_RETRY_ATTEMPTS: usize = 3;
const FIND_USER_ATTEMPTS: usize = 2;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum KeycloakError {
    #[error("keycloak credentials incomplete")]
    NotConfigured,
    #[error("admin authentication failed")]
    AuthFailed,
    #[error("user not found")]
    UserNotFound,
    #[error("permission denied by identity provider (status {0})")]
    PermissionDenied(StatusCode),
    #[error("unexpected identity provider response: {0}")]
    UnexpectedResponse(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Subset of the Keycloak user representation we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct KeycloakUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Normalize a configured Keycloak base URL to the admin REST root.
///
/// Legacy deployments serve under `/auth`, newer ones at the root. A base
/// that already contains `/auth` is taken as-is; otherwise `/auth` is
/// appended. Trailing slashes are stripped in both cases.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.contains("/auth") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/auth")
    }
}

/// Thin client over the Keycloak admin REST API.
///
/// Every operation acquires credentials as needed; nothing is cached across
/// calls, so a password rotation takes effect on the next request.
pub struct KeycloakAdminClient {
    config: KeycloakConfig,
    http_client: Client,
    base_url: String,
    retry_delay: Duration,
}

impl KeycloakAdminClient {
    pub fn new(config: KeycloakConfig) -> Result<Self, KeycloakError> {
        let http_client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        let base_url = normalize_base_url(&config.base_url);
        Ok(Self {
            config,
            http_client,
            base_url,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Shorten the fixed backoff between retry attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn realm(&self) -> &str {
        &self.config.realm
    }

    /// Password-grant token request against the master realm.
    pub async fn get_admin_token(&self) -> Result<String, KeycloakError> {
        if !self.config.is_complete() {
            return Err(KeycloakError::NotConfigured);
        }

        let token_url = format!(
            "{}/realms/master/protocol/openid-connect/token",
            self.base_url
        );

        let mut form = vec![
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", self.config.admin_username.as_str()),
            ("password", self.config.admin_password.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            if !secret.is_empty() {
                form.push(("client_secret", secret));
            }
        }

        let response = self
            .http_client
            .post(&token_url)
            .form(&form)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            warn!(
                status = %response.status(),
                "Admin token request rejected"
            );
            return Err(KeycloakError::AuthFailed);
        }

        let body: TokenResponse = response.json().await?;
        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or(KeycloakError::AuthFailed)
    }

    /// `get_admin_token` with a fixed-delay retry for transient failures.
    pub async fn get_admin_token_with_retry(&self) -> Result<String, KeycloakError> {
        let mut last_error = KeycloakError::AuthFailed;
        for attempt in 1..=TOKEN_RETRY_ATTEMPTS {
            match self.get_admin_token().await {
                Ok(token) => return Ok(token),
                Err(KeycloakError::NotConfigured) => return Err(KeycloakError::NotConfigured),
                Err(e) => {
                    debug!(attempt, error = %e, "Admin token attempt failed");
                    last_error = e;
                    if attempt < TOKEN_RETRY_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    /// Exact-email lookup in the configured realm. The first match wins when
    /// the server returns several.
    pub async fn find_user_by_email(
        &self,
        admin_token: &str,
        email: &str,
    ) -> Result<KeycloakUser, KeycloakError> {
        let users_url = format!(
            "{}/admin/realms/{}/users",
            self.base_url, self.config.realm
        );

        let response = self
            .http_client
            .get(&users_url)
            .bearer_auth(admin_token)
            .query(&[("email", email), ("exact", "true")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(KeycloakError::AuthFailed);
        }
        if !status.is_success() {
            return Err(KeycloakError::UnexpectedResponse(format!(
                "user search returned {status}"
            )));
        }

        let users: Vec<KeycloakUser> = response.json().await?;
        users.into_iter().next().ok_or(KeycloakError::UserNotFound)
    }

    /// User lookup with one retry on a refreshed token. An empty result is
    /// retried too: the first attempt may have run on a token that the server
    /// had already invalidated.
    pub async fn find_user_by_email_with_retry(
        &self,
        email: &str,
    ) -> Result<KeycloakUser, KeycloakError> {
        let mut token = self.get_admin_token_with_retry().await?;
        let mut last_error = KeycloakError::UserNotFound;

        for attempt in 1..=FIND_USER_ATTEMPTS {
            match self.find_user_by_email(&token, email).await {
                Ok(user) => return Ok(user),
                Err(e) => {
                    debug!(attempt, error = %e, "User lookup attempt failed");
                    last_error = e;
                    if attempt < FIND_USER_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                        token = self.get_admin_token_with_retry().await?;
                    }
                }
            }
        }
        Err(last_error)
    }

    /// Delete a user by id. Only 204 counts as success; 404, 403 and 401 are
    /// reported distinctly so callers can log the exact failure mode.
    pub async fn delete_user(
        &self,
        admin_token: &str,
        user_id: &str,
    ) -> Result<(), KeycloakError> {
        let delete_url = format!(
            "{}/admin/realms/{}/users/{}",
            self.base_url, self.config.realm, user_id
        );

        let response = self
            .http_client
            .delete(&delete_url)
            .bearer_auth(admin_token)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => Err(KeycloakError::UserNotFound),
            StatusCode::UNAUTHORIZED => Err(KeycloakError::AuthFailed),
            StatusCode::FORBIDDEN => Err(KeycloakError::PermissionDenied(StatusCode::FORBIDDEN)),
            other => Err(KeycloakError::UnexpectedResponse(format!(
                "delete returned {other}"
            ))),
        }
    }

    /// Deletion with one retry on a refreshed token after any failed attempt,
    /// two attempts total.
    pub async fn delete_user_with_retry(&self, user_id: &str) -> Result<(), KeycloakError> {
        let token = self.get_admin_token_with_retry().await?;
        match self.delete_user(&token, user_id).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!(error = %e, "Delete attempt failed, retrying with fresh token");
                tokio::time::sleep(self.retry_delay).await;
                let token = self.get_admin_token_with_retry().await?;
                self.delete_user(&token, user_id).await
            }
        }
    }
}
