//! Deletion orchestration: the two-step public flow and the token flow both
//! funnel into one execution path against the identity provider.

pub mod messages;

use crate::cache::Cache;
use crate::codes::ConfirmationCodeStore;
use crate::config::Config;
use crate::database::entities::{LogAction, LogStatus};
use crate::database::{DatabaseManager, NewLogEntry};
use crate::email::{EmailGateway, templates};
use crate::error::AppError;
use crate::keycloak::{KeycloakAdminClient, KeycloakError, TokenIdentity, TokenValidator};
use crate::utils::{RequestContext, is_valid_email};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

/// Stable failure codes shared by both flows. The token API surfaces them
/// verbatim; the public flow translates them to localized messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionErrorCode {
    InvalidEmail,
    InvalidOrExpiredCode,
    InvalidLink,
    NotConfigured,
    UserNotFound,
    AuthFailed,
    IdpError,
    Internal,
}

impl DeletionErrorCode {
    pub fn to_app_error(self) -> AppError {
        match self {
            DeletionErrorCode::InvalidEmail => AppError::InvalidEmail,
            DeletionErrorCode::InvalidOrExpiredCode => AppError::InvalidOrExpiredCode,
            DeletionErrorCode::InvalidLink => {
                AppError::BadRequest("invalid confirmation link".to_string())
            }
            DeletionErrorCode::NotConfigured => AppError::NotConfigured,
            DeletionErrorCode::UserNotFound => AppError::UserNotFound,
            DeletionErrorCode::AuthFailed => AppError::AuthFailed,
            DeletionErrorCode::IdpError => AppError::IdpError("deletion failed".to_string()),
            DeletionErrorCode::Internal => AppError::Internal("deletion failed".to_string()),
        }
    }
}

/// Outcome of an orchestrated operation, with a message ready for the
/// public flow.
#[derive(Debug, Clone)]
pub struct DeletionResult {
    pub success: bool,
    pub message: String,
    pub error: Option<DeletionErrorCode>,
    pub keycloak_user_id: Option<String>,
}

impl DeletionResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error: None,
            keycloak_user_id: None,
        }
    }

    fn err(code: DeletionErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(code),
            keycloak_user_id: None,
        }
    }
}

/// Anti-forgery token carried by emailed confirmation links.
pub fn sign_link(secret: &str, email: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(email.as_bytes());
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_link(secret: &str, email: &str, code: &str, token: &str) -> bool {
    sign_link(secret, email, code) == token
}

pub struct DeletionService {
    config: Config,
    codes: ConfirmationCodeStore,
    keycloak: KeycloakAdminClient,
    validator: TokenValidator,
    email_gateway: Arc<dyn EmailGateway>,
    database: Arc<dyn DatabaseManager>,
}

impl DeletionService {
    pub fn new(
        config: Config,
        cache: Arc<dyn Cache>,
        email_gateway: Arc<dyn EmailGateway>,
        database: Arc<dyn DatabaseManager>,
    ) -> Result<Self, AppError> {
        let keycloak = KeycloakAdminClient::new(config.keycloak.clone())
            .map_err(|e| AppError::Internal(format!("keycloak client: {e}")))?;
        let validator = TokenValidator::new(keycloak.base_url(), &config.keycloak.realm)
            .map_err(|e| AppError::Internal(format!("token validator: {e}")))?;

        Ok(Self {
            config,
            codes: ConfirmationCodeStore::new(cache),
            keycloak,
            validator,
            email_gateway,
            database,
        })
    }

    /// Shrink the admin client's retry backoff. Test hook.
    pub fn with_keycloak_retry_delay(mut self, delay: Duration) -> Self {
        self.keycloak = self.keycloak.with_retry_delay(delay);
        self
    }

    /// Step one of the public flow: issue a code and email it.
    pub async fn request_deletion(
        &self,
        email: &str,
        language: &str,
        ctx: &RequestContext,
    ) -> DeletionResult {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return DeletionResult::err(
                DeletionErrorCode::InvalidEmail,
                messages::invalid_email(language),
            );
        }

        let code = match self.codes.issue(&email).await {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "Failed to issue confirmation code");
                return DeletionResult::err(
                    DeletionErrorCode::Internal,
                    messages::send_failed(language),
                );
            }
        };

        let link = self.confirmation_link(&email, &code);
        let (subject, body_template) = templates::for_language(language);
        let body = templates::render(body_template, &email, &code, &link);

        match self.email_gateway.send(&email, subject, &body).await {
            Ok(()) => {
                self.log(
                    LogAction::Request,
                    LogStatus::Pending,
                    self.entry(&email, "Deletion requested; confirmation email sent", ctx),
                )
                .await;
                DeletionResult::ok(messages::request_sent(language))
            }
            Err(e) => {
                warn!(error = %e, "Confirmation email delivery failed");
                // Undo issuance so a stale code cannot linger
                if let Err(e) = self.codes.remove(&email).await {
                    warn!(error = %e, "Failed to roll back confirmation code");
                }
                self.log(
                    LogAction::Request,
                    LogStatus::Failed,
                    self.entry(&email, "Confirmation email could not be sent", ctx),
                )
                .await;
                DeletionResult::err(DeletionErrorCode::Internal, messages::send_failed(language))
            }
        }
    }

    /// Step two of the public flow: spend the code and run the deletion.
    pub async fn confirm_deletion(
        &self,
        email: &str,
        code: &str,
        language: &str,
        ctx: &RequestContext,
    ) -> DeletionResult {
        let email = email.trim().to_lowercase();

        let consumed = match self.codes.consume(&email, code).await {
            Ok(consumed) => consumed,
            Err(e) => {
                warn!(error = %e, "Confirmation code lookup failed");
                false
            }
        };

        if !consumed {
            self.log(
                LogAction::Confirmation,
                LogStatus::Failed,
                self.entry(&email, "Invalid or expired confirmation code", ctx),
            )
            .await;
            return DeletionResult::err(
                DeletionErrorCode::InvalidOrExpiredCode,
                messages::invalid_code(language),
            );
        }

        self.log(
            LogAction::Confirmation,
            LogStatus::Success,
            self.entry(&email, "Confirmation code accepted", ctx),
        )
        .await;

        self.execute_deletion(&email, None, language, ctx).await
    }

    /// Confirmation via the emailed one-shot link. The signature is checked
    /// before the code is spent, so a forged link cannot burn a valid code.
    pub async fn confirm_deletion_link(
        &self,
        email: &str,
        code: &str,
        link_token: &str,
        language: &str,
        ctx: &RequestContext,
    ) -> DeletionResult {
        let email = email.trim().to_lowercase();
        if !verify_link(&self.config.flows.link_secret, &email, code, link_token) {
            self.log(
                LogAction::Confirmation,
                LogStatus::Failed,
                self.entry(&email, "Confirmation link signature mismatch", ctx),
            )
            .await;
            return DeletionResult::err(
                DeletionErrorCode::InvalidLink,
                messages::invalid_code(language),
            );
        }

        self.confirm_deletion(&email, code, language, ctx).await
    }

    /// Programmatic self-deletion with a bearer access token.
    ///
    /// An invalid token produces no audit entry; the caller never proved an
    /// identity worth recording.
    pub async fn delete_via_token(
        &self,
        bearer: &str,
        ctx: &RequestContext,
    ) -> Result<TokenIdentity, AppError> {
        let identity = self
            .validator
            .validate(bearer)
            .await
            .map_err(|_| AppError::InvalidToken)?;

        let display = identity.display_identity();
        self.log(
            LogAction::Request,
            LogStatus::Pending,
            self.entry(&display, "Deletion requested via access token", ctx),
        )
        .await;

        let language = &self.config.email.default_language;
        let result = self
            .execute_deletion(&display, identity.subject.as_deref(), language, ctx)
            .await;

        if result.success {
            Ok(identity)
        } else {
            Err(result
                .error
                .unwrap_or(DeletionErrorCode::Internal)
                .to_app_error())
        }
    }

    /// Shared execution path: resolve the Keycloak user and delete it,
    /// recording the outcome and closing the open request entry.
    async fn execute_deletion(
        &self,
        identity: &str,
        known_user_id: Option<&str>,
        language: &str,
        ctx: &RequestContext,
    ) -> DeletionResult {
        if !self.config.keycloak.is_complete() {
            return self
                .fail(
                    identity,
                    DeletionErrorCode::NotConfigured,
                    "Identity provider not configured",
                    messages::deletion_failed(language),
                    ctx,
                )
                .await;
        }

        let user_id = match known_user_id {
            Some(id) => id.to_string(),
            None => match self.keycloak.find_user_by_email_with_retry(identity).await {
                Ok(user) => user.id,
                Err(e) => {
                    let (code, audit_message, message) = match e {
                        KeycloakError::UserNotFound => (
                            DeletionErrorCode::UserNotFound,
                            "No matching user in identity provider".to_string(),
                            messages::user_not_found(language),
                        ),
                        KeycloakError::AuthFailed | KeycloakError::NotConfigured => (
                            DeletionErrorCode::AuthFailed,
                            "Admin authentication failed".to_string(),
                            messages::deletion_failed(language),
                        ),
                        other => (
                            DeletionErrorCode::IdpError,
                            format!("User lookup failed: {other}"),
                            messages::deletion_failed(language),
                        ),
                    };
                    return self.fail(identity, code, &audit_message, message, ctx).await;
                }
            },
        };

        if let Err(e) = self.keycloak.delete_user_with_retry(&user_id).await {
            let (code, audit_message, message) = match e {
                KeycloakError::UserNotFound => (
                    DeletionErrorCode::UserNotFound,
                    "User vanished before deletion".to_string(),
                    messages::user_not_found(language),
                ),
                KeycloakError::AuthFailed | KeycloakError::NotConfigured => (
                    DeletionErrorCode::AuthFailed,
                    "Admin authentication failed".to_string(),
                    messages::deletion_failed(language),
                ),
                other => (
                    DeletionErrorCode::IdpError,
                    format!("Deletion failed: {other}"),
                    messages::deletion_failed(language),
                ),
            };
            return self.fail(identity, code, &audit_message, message, ctx).await;
        }

        info!(identity = %identity, "Account deleted from identity provider");

        let mut entry = self.entry(identity, "User deleted from identity provider", ctx);
        entry.keycloak_user_id = Some(user_id.clone());
        self.log(LogAction::Deletion, LogStatus::Success, entry).await;
        self.close_request_row(identity, LogStatus::Completed, "Account deleted")
            .await;

        let mut result = DeletionResult::ok(messages::deleted(language));
        result.keycloak_user_id = Some(user_id);
        result
    }

    async fn fail(
        &self,
        identity: &str,
        code: DeletionErrorCode,
        audit_message: &str,
        message: String,
        ctx: &RequestContext,
    ) -> DeletionResult {
        warn!(identity = %identity, reason = %audit_message, "Deletion attempt failed");
        self.log(
            LogAction::Deletion,
            LogStatus::Failed,
            self.entry(identity, audit_message, ctx),
        )
        .await;
        self.close_request_row(identity, LogStatus::Failed, audit_message)
            .await;
        DeletionResult::err(code, message)
    }

    fn confirmation_link(&self, email: &str, code: &str) -> String {
        let token = sign_link(&self.config.flows.link_secret, email, code);
        let base = format!(
            "{}/deletion/confirm",
            self.config.flows.public_base_url.trim_end_matches('/')
        );
        match Url::parse_with_params(
            &base,
            &[("email", email), ("code", code), ("token", token.as_str())],
        ) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(error = %e, "Malformed public base URL");
                base
            }
        }
    }

    fn entry(&self, email: &str, message: &str, ctx: &RequestContext) -> NewLogEntry {
        let realm = &self.config.keycloak.realm;
        NewLogEntry {
            email: email.to_string(),
            message: message.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            keycloak_realm: (!realm.is_empty()).then(|| realm.clone()),
            ..Default::default()
        }
    }

    /// Audit persistence never masks the deletion outcome.
    async fn log(&self, action: LogAction, status: LogStatus, entry: NewLogEntry) {
        if let Err(e) = self.database.deletion_logs().store(action, status, entry).await {
            warn!(error = %e, "Failed to store deletion log entry");
        }
    }

    async fn close_request_row(&self, email: &str, status: LogStatus, message: &str) {
        match self
            .database
            .deletion_logs()
            .update_status(email, LogAction::Request, status, message)
            .await
        {
            Ok(false) => {
                warn!(email = %email, "No open request entry to update");
            }
            Err(e) => {
                warn!(error = %e, "Failed to update request entry status");
            }
            Ok(true) => {}
        }
    }
}
