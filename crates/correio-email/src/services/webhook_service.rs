//! Provider webhook processing.
//!
//! Delivery callbacks arrive signed with an HMAC-SHA256 of the raw request
//! body. After verification the event is mapped to a status transition and
//! applied to every log row carrying the provider message id.

use std::sync::Arc;

use correio_config::AppConfig;
use correio_entities::email_logs;
use correio_entities::EmailStatus;
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::errors::EmailError;

type HmacSha256 = Hmac<Sha256>;

/// Delivery-status callback posted by the email provider.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookEvent {
    /// Event name, e.g. `activity.delivered`. A bare name without the
    /// `activity.` prefix is accepted too.
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WebhookEventData {
    /// Provider message id assigned when the send was accepted.
    pub message_id: Option<String>,
    pub reason: Option<String>,
    pub url: Option<String>,
}

/// Result of applying one webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The mapped status was applied to every matching log that accepted
    /// the transition. `logs_updated` can be zero when all matches were
    /// already further along in the lifecycle.
    Updated {
        logs_updated: u64,
        status: EmailStatus,
    },
    /// The event type carries no status mapping and was acknowledged
    /// without touching any log.
    Ignored { event_type: String },
}

/// Maps a provider event to the log status it implies, together with the
/// detail line recorded on the log. Unmapped events return `None`.
fn classify(event_type: &str, data: &WebhookEventData) -> Option<(EmailStatus, String)> {
    let name = event_type.strip_prefix("activity.").unwrap_or(event_type);

    match name {
        "sent" => Some((
            EmailStatus::Sent,
            "Provider accepted the message".to_string(),
        )),
        "delivered" => Some((
            EmailStatus::Delivered,
            "Delivered to recipient".to_string(),
        )),
        "soft_bounced" => Some((
            EmailStatus::Bounced,
            format!(
                "Soft bounce: {}",
                data.reason.as_deref().unwrap_or("no reason provided")
            ),
        )),
        "hard_bounced" => Some((
            EmailStatus::Bounced,
            format!(
                "Hard bounce: {}",
                data.reason.as_deref().unwrap_or("no reason provided")
            ),
        )),
        "opened" => Some((EmailStatus::Opened, "Opened by recipient".to_string())),
        "clicked" => Some((
            EmailStatus::Clicked,
            match data.url.as_deref() {
                Some(url) => format!("Link clicked: {url}"),
                None => "Link clicked".to_string(),
            },
        )),
        "spam_complaint" => Some((
            EmailStatus::Spam,
            "Marked as spam by recipient".to_string(),
        )),
        "blocked" => Some((
            EmailStatus::Blocked,
            format!(
                "Blocked: {}",
                data.reason.as_deref().unwrap_or("no reason provided")
            ),
        )),
        _ => None,
    }
}

pub struct WebhookService {
    db: Arc<DatabaseConnection>,
    config: Arc<AppConfig>,
}

impl WebhookService {
    pub fn new(db: Arc<DatabaseConnection>, config: Arc<AppConfig>) -> Self {
        Self { db, config }
    }

    /// Verifies the `X-Provider-Signature` value against the raw body.
    ///
    /// A missing secret refuses to verify in production. Outside production
    /// an unset secret skips verification with a warning so local setups
    /// can exercise the endpoint without provider credentials.
    pub fn verify_signature(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), EmailError> {
        let secret = match &self.config.webhook_secret {
            Some(secret) => secret,
            None => {
                if self.config.environment.is_production() {
                    return Err(EmailError::Configuration(
                        "Webhook secret is required in production".to_string(),
                    ));
                }
                warn!("No webhook secret configured; accepting webhook without verification");
                return Ok(());
            }
        };

        let signature = signature.ok_or(EmailError::InvalidSignature)?;
        let expected = hex::decode(signature.trim()).map_err(|_| EmailError::InvalidSignature)?;

        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(body);
        // Constant-time comparison.
        mac.verify_slice(&expected)
            .map_err(|_| EmailError::InvalidSignature)
    }

    /// Applies one event to every log row carrying its message id.
    ///
    /// Rows whose current status rejects the transition are skipped with a
    /// warning; the rest get the new status and an appended detail line.
    /// Re-delivering the same event reaches the same final state.
    pub async fn process_event(&self, event: WebhookEvent) -> Result<WebhookOutcome, EmailError> {
        let Some((next_status, detail)) = classify(&event.event_type, &event.data) else {
            debug!(event_type = %event.event_type, "Ignoring unmapped webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        };

        let message_id = event
            .data
            .message_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| EmailError::InvalidPayload("message_id is required".to_string()))?;

        let logs = email_logs::Entity::find()
            .filter(email_logs::Column::ProviderMessageId.eq(message_id))
            .all(self.db.as_ref())
            .await?;

        if logs.is_empty() {
            return Err(EmailError::UnknownProviderMessageId(message_id.to_string()));
        }

        let line = format!("{}: {}", event.event_type, detail);
        let mut logs_updated = 0u64;

        for log in logs {
            if !log.status.can_transition_to(next_status) {
                warn!(
                    log_id = log.id,
                    current = %log.status,
                    next = %next_status,
                    "Skipping out-of-order webhook status change"
                );
                continue;
            }

            let details = match &log.status_details {
                Some(existing) => format!("{existing}\n{line}"),
                None => line.clone(),
            };

            let mut active: email_logs::ActiveModel = log.into();
            active.status = Set(next_status);
            active.status_details = Set(Some(details));
            active.update(self.db.as_ref()).await?;
            logs_updated += 1;
        }

        debug!(%message_id, status = %next_status, logs_updated, "Webhook event applied");

        Ok(WebhookOutcome::Updated {
            logs_updated,
            status: next_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        production_config_without_webhook_secret, test_config, test_config_with_webhook_secret,
    };
    use correio_database::test_utils::TestDatabase;

    fn event(event_type: &str, message_id: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            event_type: event_type.to_string(),
            data: WebhookEventData {
                message_id: message_id.map(|id| id.to_string()),
                reason: None,
                url: None,
            },
        }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    async fn insert_log(
        db: &TestDatabase,
        message_id: Option<&str>,
        status: EmailStatus,
    ) -> email_logs::Model {
        email_logs::ActiveModel {
            recipient_email: Set("user@example.com".to_string()),
            recipient_name: Set(Some("Usuário".to_string())),
            email_type: Set("VERIFICATION".to_string()),
            subject: Set("Confirme seu e-mail".to_string()),
            status: Set(status),
            status_details: Set(Some("Accepted by provider".to_string())),
            provider_message_id: Set(message_id.map(|id| id.to_string())),
            ..Default::default()
        }
        .insert(db.connection())
        .await
        .unwrap()
    }

    #[test]
    fn classify_maps_provider_events() {
        let data = WebhookEventData::default();

        assert_eq!(
            classify("activity.sent", &data).map(|(s, _)| s),
            Some(EmailStatus::Sent)
        );
        assert_eq!(
            classify("delivered", &data).map(|(s, _)| s),
            Some(EmailStatus::Delivered)
        );
        assert_eq!(
            classify("activity.opened", &data).map(|(s, _)| s),
            Some(EmailStatus::Opened)
        );
        assert_eq!(
            classify("activity.spam_complaint", &data).map(|(s, _)| s),
            Some(EmailStatus::Spam)
        );
        assert_eq!(
            classify("activity.blocked", &data).map(|(s, _)| s),
            Some(EmailStatus::Blocked)
        );
        assert_eq!(classify("activity.unsubscribed", &data), None);
        assert_eq!(classify("activity.survey_opened", &data), None);
    }

    #[test]
    fn classify_records_bounce_reasons_and_click_urls() {
        let with_reason = WebhookEventData {
            reason: Some("mailbox full".to_string()),
            ..Default::default()
        };
        let (status, detail) = classify("activity.soft_bounced", &with_reason).unwrap();
        assert_eq!(status, EmailStatus::Bounced);
        assert_eq!(detail, "Soft bounce: mailbox full");

        let (status, detail) =
            classify("activity.hard_bounced", &WebhookEventData::default()).unwrap();
        assert_eq!(status, EmailStatus::Bounced);
        assert_eq!(detail, "Hard bounce: no reason provided");

        let with_url = WebhookEventData {
            url: Some("https://example.com/offer".to_string()),
            ..Default::default()
        };
        let (status, detail) = classify("activity.clicked", &with_url).unwrap();
        assert_eq!(status, EmailStatus::Clicked);
        assert_eq!(detail, "Link clicked: https://example.com/offer");
    }

    #[test]
    fn webhook_payload_parses_from_provider_json() {
        let event: WebhookEvent =
            serde_json::from_str(r#"{"type":"activity.delivered","data":{"message_id":"msg-123"}}"#)
                .unwrap();
        assert_eq!(event.event_type, "activity.delivered");
        assert_eq!(event.data.message_id.as_deref(), Some("msg-123"));

        // The data object is optional in the payload
        let bare: WebhookEvent = serde_json::from_str(r#"{"type":"activity.sent"}"#).unwrap();
        assert!(bare.data.message_id.is_none());
    }

    #[test]
    fn signature_verification_accepts_only_the_exact_body() {
        let service = WebhookService::new(
            Arc::new(DatabaseConnection::default()),
            test_config_with_webhook_secret("whsec_test"),
        );
        let body = br#"{"type":"activity.delivered","data":{"message_id":"m-1"}}"#;
        let signature = sign("whsec_test", body);

        assert!(service.verify_signature(body, Some(&signature)).is_ok());

        let mut tampered = body.to_vec();
        tampered[10] ^= 0x01;
        assert!(matches!(
            service.verify_signature(&tampered, Some(&signature)),
            Err(EmailError::InvalidSignature)
        ));

        let wrong_key = sign("other_secret", body);
        assert!(matches!(
            service.verify_signature(body, Some(&wrong_key)),
            Err(EmailError::InvalidSignature)
        ));

        assert!(matches!(
            service.verify_signature(body, Some("not hex at all")),
            Err(EmailError::InvalidSignature)
        ));

        assert!(matches!(
            service.verify_signature(body, None),
            Err(EmailError::InvalidSignature)
        ));
    }

    #[test]
    fn signature_verification_is_skipped_only_outside_production() {
        let dev = WebhookService::new(Arc::new(DatabaseConnection::default()), test_config());
        assert!(dev.verify_signature(b"{}", None).is_ok());

        let production = WebhookService::new(
            Arc::new(DatabaseConnection::default()),
            production_config_without_webhook_secret(),
        );
        assert!(matches!(
            production.verify_signature(b"{}", None),
            Err(EmailError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn delivered_event_advances_every_matching_log() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        let first = insert_log(&db, Some("m-1"), EmailStatus::Sent).await;
        let second = insert_log(&db, Some("m-1"), EmailStatus::Sent).await;
        insert_log(&db, Some("m-other"), EmailStatus::Sent).await;

        let outcome = service
            .process_event(event("activity.delivered", Some("m-1")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Updated {
                logs_updated: 2,
                status: EmailStatus::Delivered,
            }
        );

        for id in [first.id, second.id] {
            let log = email_logs::Entity::find_by_id(id)
                .one(db.connection())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(log.status, EmailStatus::Delivered);
            let details = log.status_details.unwrap();
            assert!(details.contains("Accepted by provider"));
            assert!(details.contains("activity.delivered: Delivered to recipient"));
        }
    }

    #[tokio::test]
    async fn hard_bounce_records_the_reason() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        let log = insert_log(&db, Some("m-2"), EmailStatus::Sent).await;

        let mut bounce = event("activity.hard_bounced", Some("m-2"));
        bounce.data.reason = Some("Mailbox does not exist".to_string());
        service.process_event(bounce).await.unwrap();

        let log = email_logs::Entity::find_by_id(log.id)
            .one(db.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.status, EmailStatus::Bounced);
        assert!(log
            .status_details
            .unwrap()
            .contains("Hard bounce: Mailbox does not exist"));
    }

    #[tokio::test]
    async fn unknown_message_id_is_an_error() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        let result = service
            .process_event(event("activity.delivered", Some("never-seen")))
            .await;

        assert!(matches!(
            result,
            Err(EmailError::UnknownProviderMessageId(id)) if id == "never-seen"
        ));
    }

    #[tokio::test]
    async fn missing_message_id_is_rejected() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        assert!(matches!(
            service
                .process_event(event("activity.delivered", None))
                .await,
            Err(EmailError::InvalidPayload(_))
        ));
        assert!(matches!(
            service
                .process_event(event("activity.delivered", Some("  ")))
                .await,
            Err(EmailError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn unmapped_event_is_acknowledged_without_changes() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        let log = insert_log(&db, Some("m-3"), EmailStatus::Sent).await;

        let outcome = service
            .process_event(event("activity.unsubscribed", Some("m-3")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Ignored {
                event_type: "activity.unsubscribed".to_string(),
            }
        );

        let untouched = email_logs::Entity::find_by_id(log.id)
            .one(db.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.status, EmailStatus::Sent);
        assert_eq!(untouched.status_details, log.status_details);
    }

    #[tokio::test]
    async fn out_of_order_event_is_skipped() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        let log = insert_log(&db, Some("m-4"), EmailStatus::Opened).await;

        let outcome = service
            .process_event(event("activity.delivered", Some("m-4")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Updated {
                logs_updated: 0,
                status: EmailStatus::Delivered,
            }
        );

        let untouched = email_logs::Entity::find_by_id(log.id)
            .one(db.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.status, EmailStatus::Opened);
        assert_eq!(untouched.status_details, log.status_details);
    }

    #[tokio::test]
    async fn replaying_an_event_reaches_the_same_state() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = WebhookService::new(db.connection_arc(), test_config());

        let log = insert_log(&db, Some("m-5"), EmailStatus::Sent).await;

        let first = service
            .process_event(event("activity.delivered", Some("m-5")))
            .await
            .unwrap();
        let second = service
            .process_event(event("activity.delivered", Some("m-5")))
            .await
            .unwrap();

        assert!(matches!(first, WebhookOutcome::Updated { status, .. } if status == EmailStatus::Delivered));
        assert!(matches!(second, WebhookOutcome::Updated { status, .. } if status == EmailStatus::Delivered));

        let final_state = email_logs::Entity::find_by_id(log.id)
            .one(db.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(final_state.status, EmailStatus::Delivered);
    }

    #[tokio::test]
    async fn dispatched_email_advances_to_delivered_on_webhook() {
        use crate::providers::MockEmailProvider;
        use crate::services::DispatchService;
        use correio_core::mailer::{TransactionalMailer, VerificationMail};

        let db = TestDatabase::with_migrations().await.unwrap();
        let dispatcher = DispatchService::new(
            db.connection_arc(),
            Arc::new(MockEmailProvider::new()),
            test_config(),
        );

        let receipt = dispatcher
            .send_verification_email(VerificationMail {
                to: "user@example.com".to_string(),
                name: Some("Ana".to_string()),
                verification_url: "http://localhost:8025/verify-email?token=tok".to_string(),
                user_id: None,
            })
            .await
            .unwrap();
        let message_id = receipt.provider_message_id.clone().unwrap();

        let service = WebhookService::new(db.connection_arc(), test_config());
        let outcome = service
            .process_event(event("activity.delivered", Some(&message_id)))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            WebhookOutcome::Updated { logs_updated: 1, .. }
        ));

        let log = email_logs::Entity::find_by_id(receipt.log_id)
            .one(db.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.email_type, "VERIFICATION");
        assert_eq!(log.recipient_name.as_deref(), Some("Ana"));
        assert_eq!(log.status, EmailStatus::Delivered);
    }
}
