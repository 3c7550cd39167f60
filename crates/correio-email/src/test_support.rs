use std::path::PathBuf;
use std::sync::Arc;

use correio_config::{AppConfig, Environment};

pub(crate) fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        address: "127.0.0.1:8025".to_string(),
        database_url: "postgres://localhost/correio_test".to_string(),
        environment: Environment::Development,
        base_url: "http://localhost:8025".to_string(),
        data_dir: PathBuf::from("/tmp/correio-test"),
        auth_secret: "0".repeat(64),
        mail_from_address: "noreply@correio.dev".to_string(),
        mail_from_name: "Correio".to_string(),
        mailersend_api_url: "https://api.mailersend.com".to_string(),
        mailersend_api_token: None,
        webhook_secret: None,
        admin_email: None,
    })
}

pub(crate) fn test_config_with_webhook_secret(secret: &str) -> Arc<AppConfig> {
    let mut config = (*test_config()).clone();
    config.webhook_secret = Some(secret.to_string());
    Arc::new(config)
}

pub(crate) fn production_config_without_webhook_secret() -> Arc<AppConfig> {
    let mut config = (*test_config()).clone();
    config.environment = Environment::Production;
    Arc::new(config)
}
