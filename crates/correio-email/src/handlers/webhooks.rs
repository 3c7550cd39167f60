//! Provider webhook receiver
//!
//! Public route; callers authenticate through the body signature instead
//! of a session. The raw body must be verified before any parsing.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use correio_core::{
    error_builder::{bad_request, internal_server_error, not_found, unauthorized},
    problemdetails::Problem,
    ProblemDetails,
};
use tracing::error;

use super::types::{AppState, WebhookAckResponse};
use crate::errors::EmailError;
use crate::services::{WebhookEvent, WebhookOutcome};

pub const PROVIDER_SIGNATURE_HEADER: &str = "x-provider-signature";

/// Configure webhook routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/email", post(receive_email_webhook))
}

/// Receive a delivery-status event from the email provider
#[utoipa::path(
    tag = "Webhooks",
    post,
    path = "/webhooks/email",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Event processed or acknowledged", body = WebhookAckResponse),
        (status = 400, description = "Malformed payload or missing message id", body = ProblemDetails),
        (status = 401, description = "Signature verification failed", body = ProblemDetails),
        (status = 404, description = "No log matches the provider message id", body = ProblemDetails),
        (status = 500, description = "Internal server error", body = ProblemDetails)
    )
)]
pub async fn receive_email_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, Problem> {
    let signature = headers
        .get(PROVIDER_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state
        .webhook_service
        .verify_signature(&body, signature)
        .map_err(|e| match e {
            EmailError::InvalidSignature => unauthorized()
                .detail("Webhook signature verification failed")
                .build(),
            e => {
                error!("Webhook verification is misconfigured: {}", e);
                internal_server_error()
                    .detail("Webhook processing failed")
                    .build()
            }
        })?;

    let event: WebhookEvent = serde_json::from_slice(&body).map_err(|e| {
        bad_request()
            .detail(format!("Malformed webhook payload: {e}"))
            .build()
    })?;

    match state.webhook_service.process_event(event).await {
        Ok(WebhookOutcome::Updated {
            logs_updated,
            status,
        }) => Ok(Json(WebhookAckResponse {
            message: format!("Updated {logs_updated} log(s) to {status}"),
        })),
        Ok(WebhookOutcome::Ignored { event_type }) => Ok(Json(WebhookAckResponse {
            message: format!("Ignored event type {event_type}"),
        })),
        Err(EmailError::InvalidPayload(detail)) => Err(bad_request().detail(detail).build()),
        Err(EmailError::UnknownProviderMessageId(id)) => Err(not_found()
            .detail(format!("No email log matches provider message id: {id}"))
            .build()),
        Err(e) => {
            error!("Failed to process webhook event: {}", e);
            Err(internal_server_error()
                .detail("Failed to process webhook event")
                .build())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockEmailProvider;
    use crate::services::{DispatchService, ResendService, WebhookService};
    use crate::test_support::{test_config, test_config_with_webhook_secret};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use correio_config::AppConfig;
    use correio_database::test_utils::TestDatabase;
    use correio_entities::{email_logs, EmailStatus};
    use hmac::{Hmac, Mac};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};
    use sha2::Sha256;
    use tower::ServiceExt;

    const SECRET: &str = "whsec_router_test";

    fn app(db: &TestDatabase, config: Arc<AppConfig>) -> Router {
        let dispatch = Arc::new(DispatchService::new(
            db.connection_arc(),
            Arc::new(MockEmailProvider::new()),
            config.clone(),
        ));
        let state = Arc::new(AppState {
            dispatch_service: dispatch.clone(),
            webhook_service: Arc::new(WebhookService::new(db.connection_arc(), config.clone())),
            resend_service: Arc::new(ResendService::new(db.connection_arc(), dispatch, config)),
        });
        routes().with_state(state)
    }

    fn sign(body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    async fn post_event(app: Router, body: &[u8], signature: Option<&str>) -> StatusCode {
        let mut request = Request::builder()
            .method("POST")
            .uri("/webhooks/email")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            request = request.header(PROVIDER_SIGNATURE_HEADER, signature);
        }
        let response = app
            .oneshot(request.body(Body::from(body.to_vec())).unwrap())
            .await
            .unwrap();
        response.status()
    }

    async fn insert_sent_log(db: &TestDatabase, message_id: &str) -> email_logs::Model {
        email_logs::ActiveModel {
            recipient_email: Set("user@example.com".to_string()),
            recipient_name: Set(Some("Usuário".to_string())),
            email_type: Set("VERIFICATION".to_string()),
            subject: Set("Confirme seu e-mail".to_string()),
            status: Set(EmailStatus::Sent),
            status_details: Set(Some("Accepted by provider".to_string())),
            provider_message_id: Set(Some(message_id.to_string())),
            ..Default::default()
        }
        .insert(db.connection())
        .await
        .unwrap()
    }

    async fn log_status(db: &TestDatabase, id: i32) -> EmailStatus {
        email_logs::Entity::find_by_id(id)
            .one(db.connection())
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn signed_event_updates_the_log() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let log = insert_sent_log(&db, "msg-1").await;

        let body = br#"{"type":"activity.delivered","data":{"message_id":"msg-1"}}"#;
        let status = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            body,
            Some(&sign(body)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(log_status(&db, log.id).await, EmailStatus::Delivered);
    }

    #[tokio::test]
    async fn tampered_body_is_rejected_without_side_effects() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let log = insert_sent_log(&db, "msg-2").await;

        let body = br#"{"type":"activity.delivered","data":{"message_id":"msg-2"}}"#;
        let signature = sign(body);
        let mut tampered = body.to_vec();
        tampered[20] ^= 0x01;

        let status = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            &tampered,
            Some(&signature),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(log_status(&db, log.id).await, EmailStatus::Sent);
    }

    #[tokio::test]
    async fn missing_signature_is_rejected_when_a_secret_is_set() {
        let db = TestDatabase::with_migrations().await.unwrap();
        insert_sent_log(&db, "msg-3").await;

        let body = br#"{"type":"activity.delivered","data":{"message_id":"msg-3"}}"#;
        let status = post_event(app(&db, test_config_with_webhook_secret(SECRET)), body, None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsigned_events_pass_in_development_without_a_secret() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let log = insert_sent_log(&db, "msg-4").await;

        let body = br#"{"type":"activity.delivered","data":{"message_id":"msg-4"}}"#;
        let status = post_event(app(&db, test_config()), body, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(log_status(&db, log.id).await, EmailStatus::Delivered);
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let db = TestDatabase::with_migrations().await.unwrap();

        let garbage = b"not json";
        let status = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            garbage,
            Some(&sign(garbage)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let no_message_id = br#"{"type":"activity.delivered","data":{}}"#;
        let status = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            no_message_id,
            Some(&sign(no_message_id)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_message_id_is_a_not_found() {
        let db = TestDatabase::with_migrations().await.unwrap();

        let body = br#"{"type":"activity.delivered","data":{"message_id":"never-seen"}}"#;
        let status = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            body,
            Some(&sign(body)),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn replayed_events_are_acknowledged_both_times() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let log = insert_sent_log(&db, "msg-5").await;

        let body = br#"{"type":"activity.delivered","data":{"message_id":"msg-5"}}"#;
        let signature = sign(body);

        let first = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            body,
            Some(&signature),
        )
        .await;
        let second = post_event(
            app(&db, test_config_with_webhook_secret(SECRET)),
            body,
            Some(&signature),
        )
        .await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(log_status(&db, log.id).await, EmailStatus::Delivered);
    }
}
