//! Outgoing confirmation email delivery.

pub mod templates;

use crate::config::EmailConfig;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait EmailGateway: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError>;
}

/// Build the configured gateway backend.
pub fn create_gateway(config: &EmailConfig) -> Result<Arc<dyn EmailGateway>, EmailError> {
    match config.backend.as_str() {
        "mailgun" => Ok(Arc::new(MailgunGateway::new(config)?)),
        _ => Ok(Arc::new(NoopGateway)),
    }
}

/// Sends via the Mailgun HTTP API.
pub struct MailgunGateway {
    http_client: Client,
    api_base_url: String,
    api_key: String,
    domain: String,
    from_address: String,
}

impl MailgunGateway {
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            domain: config.domain.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailGateway for MailgunGateway {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        let url = format!("{}/{}/messages", self.api_base_url, self.domain);
        let params = [
            ("from", self.from_address.as_str()),
            ("to", to),
            ("subject", subject),
            ("html", html_body),
        ];

        let response = self
            .http_client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Mailgun rejected message");
            return Err(EmailError::Delivery(format!(
                "mailgun returned {status}"
            )));
        }

        debug!(to = %to, "Confirmation email accepted for delivery");
        Ok(())
    }
}

/// Drops messages. For deployments without outgoing mail and for tests.
pub struct NoopGateway;

#[async_trait]
impl EmailGateway for NoopGateway {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<(), EmailError> {
        debug!(to = %to, subject = %subject, "Email backend disabled, dropping message");
        Ok(())
    }
}
