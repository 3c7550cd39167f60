//! HTTP handlers for the email pipeline

mod emails;
mod types;
mod webhooks;

pub use types::AppState;

use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;

/// Configure email routes
pub fn configure_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(emails::routes())
        .merge(webhooks::routes())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Admin log endpoints
        emails::list_email_logs,
        emails::get_email_log,
        emails::get_email_stats,
        emails::send_test_email,
        emails::resend_email,
        // Provider callbacks
        webhooks::receive_email_webhook,
    ),
    components(
        schemas(
            types::EmailLogResponse,
            types::PaginatedEmailLogsResponse,
            types::EmailStatsResponse,
            types::TestEmailStyle,
            types::SendTestEmailRequest,
            types::SendTestEmailResponse,
            types::ResendEmailRequest,
            types::ResendDetails,
            types::ResendEmailResponse,
            types::WebhookAckResponse,
            crate::services::WebhookEvent,
            crate::services::WebhookEventData,
        )
    ),
    tags(
        (name = "Emails", description = "Email log administration and test sends"),
        (name = "Webhooks", description = "Provider delivery-status callbacks")
    )
)]
pub struct EmailApiDoc;
