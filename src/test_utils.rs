//! Shared helpers for unit and integration tests.

use crate::cache::{Cache, MemoryCache};
use crate::config::Config;
use crate::database::{DatabaseManager, DatabaseManagerImpl};
use crate::deletion::DeletionService;
use crate::email::{EmailError, EmailGateway};
use crate::rate_limit::RateLimitService;
use crate::server::Server;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// A captured outgoing email.
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email gateway that records instead of sending, with a failure toggle.
#[derive(Default)]
pub struct RecordingEmailGateway {
    sent: Mutex<Vec<SentEmail>>,
    fail_next: AtomicBool,
}

impl RecordingEmailGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn last(&self) -> Option<SentEmail> {
        self.sent.lock().await.last().cloned()
    }
}

#[async_trait]
impl EmailGateway for RecordingEmailGateway {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), EmailError> {
        if self.fail_next.load(Ordering::SeqCst) {
            return Err(EmailError::Delivery("simulated failure".to_string()));
        }
        self.sent.lock().await.push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: html_body.to_string(),
        });
        Ok(())
    }
}

/// Builds a fully wired `Server` on an in-memory database, with migrations
/// applied and retry backoffs shortened.
pub struct TestServerBuilder {
    config: Config,
    email_gateway: Option<Arc<dyn EmailGateway>>,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.database.url = "sqlite::memory:".to_string();
        config.flows.link_secret = "test-link-secret".to_string();
        config.flows.public_base_url = "http://localhost:3000".to_string();
        Self {
            config,
            email_gateway: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_email_gateway(mut self, gateway: Arc<dyn EmailGateway>) -> Self {
        self.email_gateway = Some(gateway);
        self
    }

    pub async fn build(self) -> Server {
        let config = self.config;

        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());

        let database: Arc<dyn DatabaseManager> = Arc::new(
            DatabaseManagerImpl::new_from_config(&config)
                .await
                .expect("test database"),
        );
        database.migrate().await.expect("test migrations");

        let email_gateway = self
            .email_gateway
            .unwrap_or_else(|| RecordingEmailGateway::new());

        let deletion_service = Arc::new(
            DeletionService::new(
                config.clone(),
                cache.clone(),
                email_gateway,
                database.clone(),
            )
            .expect("deletion service")
            .with_keycloak_retry_delay(Duration::from_millis(25)),
        );

        let rate_limiter = Arc::new(RateLimitService::new(&config.rate_limit));

        Server {
            config: Arc::new(config),
            database,
            cache,
            deletion_service,
            rate_limiter,
        }
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
