use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub keycloak: KeycloakConfig,
    pub email: EmailConfig,
    pub flows: FlowsConfig,
    pub rate_limit: RateLimitConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Credentials and coordinates for the Keycloak admin API.
///
/// Completeness is checked per deletion attempt rather than at load time so
/// that an unconfigured deployment can still serve its public pages and
/// report `not_configured` on deletion attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub admin_username: String,
    pub admin_password: String,
}

impl KeycloakConfig {
    /// All required fields present? `client_secret` is optional (public clients).
    pub fn is_complete(&self) -> bool {
        !self.base_url.is_empty()
            && !self.realm.is_empty()
            && !self.client_id.is_empty()
            && !self.admin_username.is_empty()
            && !self.admin_password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// "mailgun" or "noop"
    pub backend: String,
    pub api_base_url: String,
    pub api_key: String,
    pub domain: String,
    pub from_address: String,
    /// Language for outgoing mail when the request carries no preference: "en" or "de"
    pub default_language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    pub enable_public_flow: bool,
    pub enable_token_api: bool,
    /// External base URL used to build confirmation links in emails
    pub public_base_url: String,
    /// Secret for signing confirmation links
    pub link_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Window length in seconds for the token deletion endpoint
    pub window_secs: u64,
    /// Accepted calls per client IP within one window
    pub max_requests: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Bearer key for the admin log API; endpoints reject everything when unset
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
            },
            keycloak: KeycloakConfig {
                base_url: String::new(),
                realm: String::new(),
                client_id: String::new(),
                client_secret: None,
                admin_username: String::new(),
                admin_password: String::new(),
            },
            email: EmailConfig {
                backend: "noop".to_string(),
                api_base_url: "https://api.mailgun.net/v3".to_string(),
                api_key: String::new(),
                domain: String::new(),
                from_address: String::new(),
                default_language: "en".to_string(),
            },
            flows: FlowsConfig {
                enable_public_flow: true,
                enable_token_api: true,
                public_base_url: "http://localhost:3000".to_string(),
                link_secret: String::new(),
            },
            rate_limit: RateLimitConfig {
                enabled: true,
                window_secs: 300,
                max_requests: 10,
            },
            admin: AdminConfig { api_key: None },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("GDPR")
                .prefix_separator("_")
                .separator("__"),
        );

        builder.build()?.try_deserialize()
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(
            Environment::with_prefix("GDPR")
                .prefix_separator("_")
                .separator("__"),
        );

        builder.build()?.try_deserialize()
    }

    /// Structural validation, run once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("database.url must be set".into()));
        }
        match self.email.backend.as_str() {
            "mailgun" => {
                if self.email.api_key.is_empty() || self.email.domain.is_empty() {
                    return Err(ConfigError::Message(
                        "email.api_key and email.domain are required for the mailgun backend"
                            .into(),
                    ));
                }
            }
            "noop" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "unknown email backend: {other}"
                )));
            }
        }
        match self.email.default_language.as_str() {
            "en" | "de" => {}
            other => {
                return Err(ConfigError::Message(format!(
                    "unsupported default language: {other}"
                )));
            }
        }
        if self.flows.enable_public_flow && self.flows.link_secret.is_empty() {
            return Err(ConfigError::Message(
                "flows.link_secret must be set when the public flow is enabled".into(),
            ));
        }
        if self.rate_limit.enabled
            && (self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0)
        {
            return Err(ConfigError::Message(
                "rate_limit.window_secs and rate_limit.max_requests must be non-zero".into(),
            ));
        }
        if !self.keycloak.is_complete() {
            warn!("Keycloak credentials incomplete; deletion attempts will fail as not_configured");
        }
        Ok(())
    }
}
