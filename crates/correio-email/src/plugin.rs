//! Plugin wiring for the email pipeline.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use correio_config::AppConfig;
use correio_core::plugin::{
    CorreioPlugin, PluginContext, PluginError, PluginRoutes, ServiceRegistrationContext,
};
use correio_core::TransactionalMailer;
use sea_orm::DatabaseConnection;
use tracing::{debug, warn};
use utoipa::OpenApi;

use crate::handlers::{self, AppState, EmailApiDoc};
use crate::providers::{EmailProvider, MailerSendProvider, MockEmailProvider};
use crate::services::{DispatchService, ResendService, WebhookService};

#[derive(Default)]
pub struct EmailPlugin;

impl EmailPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CorreioPlugin for EmailPlugin {
    fn name(&self) -> &'static str {
        "email"
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

            // Production refuses to boot without a provider token (config
            // validation), so the mock fallback only ever runs in development.
            let provider: Arc<dyn EmailProvider> = match &config.mailersend_api_token {
                Some(token) => Arc::new(MailerSendProvider::new(
                    &config.mailersend_api_url,
                    token.clone(),
                )),
                None => {
                    warn!("No MailerSend API token configured; using the in-memory mock provider");
                    Arc::new(MockEmailProvider::new())
                }
            };

            let dispatch_service = Arc::new(DispatchService::new(
                db.clone(),
                provider,
                config.clone(),
            ));
            context.register_service(dispatch_service.clone());

            // Other plugins reach the dispatcher through the mailer seam.
            let mailer: Arc<dyn TransactionalMailer> = dispatch_service.clone();
            context.register_service(mailer);

            let webhook_service = Arc::new(WebhookService::new(db.clone(), config.clone()));
            context.register_service(webhook_service.clone());

            let resend_service = Arc::new(ResendService::new(
                db,
                dispatch_service.clone(),
                config,
            ));
            context.register_service(resend_service.clone());

            let app_state = Arc::new(AppState {
                dispatch_service,
                webhook_service,
                resend_service,
            });
            context.register_service(app_state);

            debug!("Email plugin services registered successfully");
            Ok(())
        })
    }

    fn configure_routes(&self, context: &PluginContext) -> Option<PluginRoutes> {
        let app_state = context.get_service::<AppState>()?;
        let router = handlers::configure_routes().with_state(app_state);
        Some(PluginRoutes { router })
    }

    fn openapi_schema(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(EmailApiDoc::openapi())
    }
}
