//! Config plugin for the Correio plugin system
//!
//! Resolves the application configuration once at startup and shares it with
//! every other plugin through the service registry.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use correio_core::plugin::{CorreioPlugin, PluginError, ServiceRegistrationContext};

use crate::AppConfig;

/// Config plugin exposing the resolved [`AppConfig`]
pub struct ConfigPlugin {
    config: Arc<AppConfig>,
}

impl ConfigPlugin {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }
}

impl CorreioPlugin for ConfigPlugin {
    fn name(&self) -> &'static str {
        "config"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            context.register_service(self.config.clone());

            tracing::debug!("Config plugin services registered successfully");
            Ok(())
        })
    }
}
