//! Plugin wiring for the auth feature.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use correio_config::AppConfig;
use correio_core::plugin::{
    CorreioPlugin, PluginContext, PluginError, PluginMiddlewareCollection, PluginRoutes,
    ServiceRegistrationContext,
};
use correio_core::{CookieCrypto, TransactionalMailer};
use sea_orm::DatabaseConnection;
use tracing::debug;
use utoipa::OpenApi;

use crate::auth_service::AuthService;
use crate::handlers::{self, AuthApiDoc};
use crate::middleware::SessionAuthMiddleware;
use crate::state::AuthState;

#[derive(Default)]
pub struct AuthPlugin;

impl AuthPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CorreioPlugin for AuthPlugin {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn register_services<'a>(
        &'a self,
        context: &'a ServiceRegistrationContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), PluginError>> + Send + 'a>> {
        Box::pin(async move {
            let db = context.get_service::<DatabaseConnection>().ok_or(
                PluginError::ServiceNotFound {
                    service_type: "DatabaseConnection".to_string(),
                },
            )?;
            let config =
                context
                    .get_service::<AppConfig>()
                    .ok_or(PluginError::ServiceNotFound {
                        service_type: "AppConfig".to_string(),
                    })?;
            let cookie_crypto =
                context
                    .get_service::<CookieCrypto>()
                    .ok_or(PluginError::ServiceNotFound {
                        service_type: "CookieCrypto".to_string(),
                    })?;
            let mailer = context.get_service::<dyn TransactionalMailer>().ok_or(
                PluginError::ServiceNotFound {
                    service_type: "TransactionalMailer".to_string(),
                },
            )?;

            let auth_service = Arc::new(AuthService::new(db.clone(), mailer, config));
            context.register_service(auth_service.clone());

            let auth_state = Arc::new(AuthState::new(db, auth_service, cookie_crypto));
            context.register_service(auth_state);

            debug!("Auth plugin services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let auth_state = context.get_service::<AuthState>()?;
        let router = handlers::configure_routes().with_state(auth_state);
        Some(PluginRoutes { router })
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(AuthApiDoc::openapi())
    }

    fn configure_middleware(&self, context: &PluginContext) -> Option<PluginMiddlewareCollection> {
        let auth_service = context.get_service::<AuthService>()?;
        let cookie_crypto = context.get_service::<CookieCrypto>()?;

        let mut collection = PluginMiddlewareCollection::new();
        collection.add_correio_middleware(Arc::new(SessionAuthMiddleware::new(
            auth_service,
            cookie_crypto,
        )));
        Some(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_reports_its_name() {
        assert_eq!(AuthPlugin::new().name(), "auth");
    }
}
