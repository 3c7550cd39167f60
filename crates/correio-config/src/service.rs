use std::fs;
use std::path::PathBuf;
use thiserror::Error;

// Well-known paths relative to data_dir
pub const AUTH_SECRET_FILE: &str = "auth_secret";

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {details}")]
    InvalidConfiguration { details: String },
}

/// Deployment environment. Controls which safety checks are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse the `CORREIO_ENV` value. Anything that is not production is
    /// treated as development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Immutable application configuration.
///
/// Resolved once at startup from CLI arguments and `CORREIO_*` environment
/// variables, then shared as `Arc<AppConfig>` through the service registry.
/// Nothing reads the environment after this point.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    // Required fields
    pub address: String,
    pub database_url: String,

    pub environment: Environment,

    /// Public base URL used to build verification and reset links
    pub base_url: String,

    // Generated/derived fields
    pub data_dir: PathBuf,
    pub auth_secret: String,

    // Outbound email
    pub mail_from_address: String,
    pub mail_from_name: String,
    pub mailersend_api_url: String,
    pub mailersend_api_token: Option<String>,

    /// Shared secret for webhook signature verification
    pub webhook_secret: Option<String>,

    /// Bootstrap admin account created on first start
    pub admin_email: Option<String>,
}

impl AppConfig {
    /// Create a new configuration with minimal parameters
    pub fn new(
        address: String,
        database_url: String,
        base_url: Option<String>,
        admin_email: Option<String>,
    ) -> Result<Self, ConfigError> {
        // Determine data directory from env or use default
        let data_dir = std::env::var("CORREIO_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .expect("Could not find home directory")
                    .join(".correio")
            });

        // Create data directory if it doesn't exist
        fs::create_dir_all(&data_dir)?;

        // Generate or load auth_secret (32 bytes in hex format)
        let auth_secret_path = data_dir.join(AUTH_SECRET_FILE);
        let auth_secret = if auth_secret_path.exists() {
            fs::read_to_string(&auth_secret_path)?.trim().to_string()
        } else {
            let secret = Self::generate_auth_secret();
            fs::write(&auth_secret_path, &secret)?;
            secret
        };

        let environment = std::env::var("CORREIO_ENV")
            .map(|value| Environment::parse(&value))
            .unwrap_or(Environment::Development);

        // Fall back to the listen address so local link clicks resolve
        let base_url = base_url
            .or_else(|| std::env::var("CORREIO_BASE_URL").ok())
            .unwrap_or_else(|| format!("http://{}", address));

        let admin_email = admin_email.or_else(|| std::env::var("CORREIO_ADMIN_EMAIL").ok());

        Ok(AppConfig {
            address,
            database_url,
            environment,
            base_url,
            data_dir,
            auth_secret,
            mail_from_address: std::env::var("CORREIO_MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@correio.dev".to_string()),
            mail_from_name: std::env::var("CORREIO_MAIL_FROM_NAME")
                .unwrap_or_else(|_| "Correio".to_string()),
            mailersend_api_url: std::env::var("CORREIO_MAILERSEND_API_URL")
                .unwrap_or_else(|_| "https://api.mailersend.com".to_string()),
            mailersend_api_token: std::env::var("CORREIO_MAILERSEND_API_TOKEN").ok(),
            webhook_secret: std::env::var("CORREIO_WEBHOOK_SECRET").ok(),
            admin_email,
        })
    }

    /// Generate a 32-byte auth secret (64 hex characters)
    fn generate_auth_secret() -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.gen::<u8>()).collect();
        hex::encode(bytes)
    }

    /// Check the resolved configuration for fatal mistakes.
    ///
    /// Production deployments must be able to verify webhook signatures and
    /// reach the email provider, so both secrets are mandatory there.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parsed =
            url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidConfiguration {
                details: format!("base_url '{}' is not a valid URL: {}", self.base_url, e),
            })?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidConfiguration {
                details: format!("base_url must be http or https, got '{}'", parsed.scheme()),
            });
        }

        if self.environment.is_production() {
            if self.webhook_secret.is_none() {
                return Err(ConfigError::InvalidConfiguration {
                    details: "CORREIO_WEBHOOK_SECRET is required in production; \
                              unsigned webhook events would be accepted otherwise"
                        .to_string(),
                });
            }
            if self.mailersend_api_token.is_none() {
                return Err(ConfigError::InvalidConfiguration {
                    details: "CORREIO_MAILERSEND_API_TOKEN is required in production".to_string(),
                });
            }
        } else if self.webhook_secret.is_none() {
            tracing::warn!(
                "No webhook secret configured; webhook signature verification is disabled \
                 outside production"
            );
        }

        Ok(())
    }

    // Helper methods
    pub fn get_data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        AppConfig {
            address: "127.0.0.1:8080".to_string(),
            database_url: "postgres://localhost/correio".to_string(),
            environment: Environment::Development,
            base_url: "http://localhost:8080".to_string(),
            data_dir: PathBuf::from("/tmp"),
            auth_secret: "a".repeat(64),
            mail_from_address: "no-reply@correio.dev".to_string(),
            mail_from_name: "Correio".to_string(),
            mailersend_api_url: "https://api.mailersend.com".to_string(),
            mailersend_api_token: None,
            webhook_secret: None,
            admin_email: None,
        }
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse("PROD"), Environment::Production);
        assert_eq!(Environment::parse("development"), Environment::Development);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert!(!Environment::parse("dev").is_production());
    }

    #[test]
    fn test_validate_accepts_development_without_secrets() {
        let config = test_config();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let mut config = test_config();
        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_production_requires_secrets() {
        let mut config = test_config();
        config.environment = Environment::Production;
        assert!(config.validate().is_err());

        config.webhook_secret = Some("whsec".to_string());
        assert!(config.validate().is_err());

        config.mailersend_api_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_auth_secret_persists_across_loads() -> anyhow::Result<()> {
        let data_dir =
            std::env::temp_dir().join(format!("correio-config-{}", uuid::Uuid::new_v4()));
        std::env::set_var("CORREIO_DATA_DIR", &data_dir);

        let first = AppConfig::new(
            "127.0.0.1:8080".to_string(),
            "postgres://localhost/correio".to_string(),
            None,
            None,
        )?;
        let second = AppConfig::new(
            "127.0.0.1:8080".to_string(),
            "postgres://localhost/correio".to_string(),
            None,
            None,
        )?;

        assert_eq!(first.auth_secret, second.auth_secret);
        assert_eq!(first.auth_secret.len(), 64);
        assert!(hex::decode(&first.auth_secret).is_ok());

        std::env::remove_var("CORREIO_DATA_DIR");
        std::fs::remove_dir_all(&data_dir).ok();
        Ok(())
    }
}
