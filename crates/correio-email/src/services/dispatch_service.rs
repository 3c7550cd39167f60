//! Outbound email dispatch.
//!
//! Every invocation writes exactly one `email_logs` row before the provider
//! is contacted, so even a provider outage leaves a queryable audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use correio_config::AppConfig;
use correio_core::mailer::{
    DispatchOutcome, DispatchReceipt, MailerError, PasswordResetMail, TransactionalMailer,
    VerificationMail,
};
use correio_entities::email_logs;
use correio_entities::{EmailStatus, EmailType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, error};

use crate::errors::EmailError;
use crate::providers::{EmailProvider, SendEmailRequest};
use crate::templates::{self, RenderedEmail};

/// Which template a test send exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestEmailKind {
    Verification,
    PasswordReset,
}

/// Filters and paging for the admin log listing.
#[derive(Debug, Clone, Default)]
pub struct ListLogsOptions {
    pub status: Option<EmailStatus>,
    pub email_type: Option<String>,
    pub recipient_email: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Log counts broken down by delivery state.
#[derive(Debug, Clone, Default)]
pub struct LogStats {
    pub total: u64,
    pub pending: u64,
    pub sent: u64,
    pub failed: u64,
    pub delivered: u64,
    pub opened: u64,
    pub clicked: u64,
    pub bounced: u64,
    pub spam: u64,
    pub blocked: u64,
}

/// Renders, records and sends transactional email through the configured
/// provider. Used directly by the admin routes and as the
/// [`TransactionalMailer`] implementation behind the auth flows.
pub struct DispatchService {
    db: Arc<DatabaseConnection>,
    provider: Arc<dyn EmailProvider>,
    config: Arc<AppConfig>,
}

impl DispatchService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn EmailProvider>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            provider,
            config,
        }
    }

    /// Records a PENDING log row, hands the message to the provider and
    /// settles the row to SENT or FAILED.
    ///
    /// Provider rejections come back as a `Failed` receipt rather than an
    /// error. `Err` means the pipeline itself broke: the recipient address
    /// is unusable or the audit row could not be written.
    async fn dispatch(
        &self,
        to: &str,
        name: Option<&str>,
        email_type: &str,
        rendered: RenderedEmail,
        user_id: Option<i32>,
    ) -> Result<DispatchReceipt, MailerError> {
        // Recipient addresses are stored lowercased, same as user accounts,
        // so the admin email filter can match case-insensitively.
        let recipient = to.trim().to_lowercase();
        if recipient.is_empty() || !recipient.contains('@') {
            return Err(MailerError::InvalidRecipient(to.to_string()));
        }

        let display_name = templates::recipient_name(name).to_string();

        let log = email_logs::ActiveModel {
            recipient_email: Set(recipient.clone()),
            recipient_name: Set(Some(display_name.clone())),
            email_type: Set(email_type.to_string()),
            subject: Set(rendered.subject.clone()),
            status: Set(EmailStatus::Pending),
            user_id: Set(user_id),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| MailerError::Internal(format!("Failed to record email log: {e}")))?;

        debug!(
            log_id = log.id,
            email_type,
            provider = self.provider.provider_name(),
            "Dispatching email"
        );

        let request = SendEmailRequest {
            from: self.config.mail_from_address.clone(),
            from_name: Some(self.config.mail_from_name.clone()),
            to: recipient,
            to_name: Some(display_name),
            subject: rendered.subject,
            html: Some(rendered.html),
            text: Some(rendered.text),
        };

        match self.provider.send(&request).await {
            Ok(response) => {
                let mut active: email_logs::ActiveModel = log.clone().into();
                active.status = Set(EmailStatus::Sent);
                active.provider_message_id = Set(Some(response.message_id.clone()));
                active.status_details = Set(Some("Accepted by provider".to_string()));
                active.update(self.db.as_ref()).await.map_err(|e| {
                    MailerError::Internal(format!("Failed to update email log: {e}"))
                })?;

                debug!(log_id = log.id, message_id = %response.message_id, "Email sent");

                Ok(DispatchReceipt {
                    log_id: log.id,
                    outcome: DispatchOutcome::Sent,
                    provider_message_id: Some(response.message_id),
                    detail: None,
                })
            }
            Err(e) => {
                let detail = e.to_string();
                error!(log_id = log.id, error = %detail, "Email dispatch failed");

                let mut active: email_logs::ActiveModel = log.clone().into();
                active.status = Set(EmailStatus::Failed);
                active.status_details = Set(Some(detail.clone()));
                active.update(self.db.as_ref()).await.map_err(|e| {
                    MailerError::Internal(format!("Failed to update email log: {e}"))
                })?;

                Ok(DispatchReceipt {
                    log_id: log.id,
                    outcome: DispatchOutcome::Failed,
                    provider_message_id: None,
                    detail: Some(detail),
                })
            }
        }
    }

    /// Sends a test message so an operator can verify provider wiring.
    /// Tokens in the links are synthetic and resolve to nothing.
    pub async fn send_test_email(
        &self,
        to: &str,
        name: Option<&str>,
        kind: TestEmailKind,
    ) -> Result<DispatchReceipt, MailerError> {
        let display_name = templates::recipient_name(name);
        let now_ms = Utc::now().timestamp_millis();

        let rendered = match kind {
            TestEmailKind::Verification => {
                let token = format!("test-verification-{now_ms}");
                let url = format!(
                    "{}/verify-email?token={}",
                    self.config.base_url,
                    urlencoding::encode(&token)
                );
                let mut rendered = templates::verification_email(display_name, &url);
                rendered.subject = templates::TEST_VERIFICATION_SUBJECT.to_string();
                rendered
            }
            TestEmailKind::PasswordReset => {
                let token = format!("test-reset-{now_ms}");
                let url = format!(
                    "{}/reset-password?token={}",
                    self.config.base_url,
                    urlencoding::encode(&token)
                );
                let mut rendered = templates::password_reset_email(display_name, &url);
                rendered.subject = templates::TEST_PASSWORD_RESET_SUBJECT.to_string();
                rendered
            }
        };

        self.dispatch(to, name, EmailType::Test.as_str(), rendered, None)
            .await
    }

    /// Lists log rows, newest first, with optional filters and paging.
    /// Returns the page plus the total row count across all pages.
    pub async fn list(
        &self,
        options: ListLogsOptions,
    ) -> Result<(Vec<email_logs::Model>, u64), EmailError> {
        let page = options.page.unwrap_or(1).max(1);
        let limit = options.limit.unwrap_or(20).clamp(1, 100);

        let mut query = email_logs::Entity::find();

        if let Some(status) = options.status {
            query = query.filter(email_logs::Column::Status.eq(status));
        }
        if let Some(email_type) = options.email_type {
            query = query.filter(email_logs::Column::EmailType.eq(email_type));
        }
        if let Some(email) = options.recipient_email {
            // Substring match; rows are stored lowercased so lowercasing the
            // needle makes the filter case-insensitive.
            query = query.filter(email_logs::Column::RecipientEmail.contains(email.to_lowercase()));
        }

        let paginator = query
            .order_by_desc(email_logs::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await?;
        let logs = paginator.fetch_page(page - 1).await?;

        Ok((logs, total))
    }

    pub async fn get(&self, id: i32) -> Result<email_logs::Model, EmailError> {
        email_logs::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(EmailError::LogNotFound(id))
    }

    pub async fn count_by_status(&self) -> Result<LogStats, EmailError> {
        Ok(LogStats {
            total: email_logs::Entity::find().count(self.db.as_ref()).await?,
            pending: self.count_with_status(EmailStatus::Pending).await?,
            sent: self.count_with_status(EmailStatus::Sent).await?,
            failed: self.count_with_status(EmailStatus::Failed).await?,
            delivered: self.count_with_status(EmailStatus::Delivered).await?,
            opened: self.count_with_status(EmailStatus::Opened).await?,
            clicked: self.count_with_status(EmailStatus::Clicked).await?,
            bounced: self.count_with_status(EmailStatus::Bounced).await?,
            spam: self.count_with_status(EmailStatus::Spam).await?,
            blocked: self.count_with_status(EmailStatus::Blocked).await?,
        })
    }

    async fn count_with_status(&self, status: EmailStatus) -> Result<u64, EmailError> {
        Ok(email_logs::Entity::find()
            .filter(email_logs::Column::Status.eq(status))
            .count(self.db.as_ref())
            .await?)
    }
}

#[async_trait]
impl TransactionalMailer for DispatchService {
    async fn send_verification_email(
        &self,
        mail: VerificationMail,
    ) -> Result<DispatchReceipt, MailerError> {
        let name = templates::recipient_name(mail.name.as_deref());
        let rendered = templates::verification_email(name, &mail.verification_url);
        self.dispatch(
            &mail.to,
            mail.name.as_deref(),
            EmailType::Verification.as_str(),
            rendered,
            mail.user_id,
        )
        .await
    }

    async fn send_password_reset_email(
        &self,
        mail: PasswordResetMail,
    ) -> Result<DispatchReceipt, MailerError> {
        let name = templates::recipient_name(mail.name.as_deref());
        let rendered = templates::password_reset_email(name, &mail.reset_url);
        self.dispatch(
            &mail.to,
            mail.name.as_deref(),
            EmailType::PasswordReset.as_str(),
            rendered,
            mail.user_id,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockEmailProvider;
    use crate::test_support::test_config;
    use correio_database::test_utils::TestDatabase;

    fn service(db: &TestDatabase, provider: Arc<dyn EmailProvider>) -> DispatchService {
        DispatchService::new(db.connection_arc(), provider, test_config())
    }

    async fn all_logs(db: &TestDatabase) -> Vec<email_logs::Model> {
        email_logs::Entity::find().all(db.connection()).await.unwrap()
    }

    #[tokio::test]
    async fn verification_send_records_a_sent_log() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        let receipt = service
            .send_verification_email(VerificationMail {
                to: "Maria@Example.COM".to_string(),
                name: Some("Maria".to_string()),
                verification_url: "http://localhost:8025/verify-email?token=abc".to_string(),
                user_id: Some(7),
            })
            .await
            .unwrap();

        assert!(receipt.is_sent());
        let message_id = receipt.provider_message_id.as_deref().unwrap();
        assert!(message_id.starts_with("mock-message-"));

        let logs = all_logs(&db).await;
        assert_eq!(logs.len(), 1);
        let log = &logs[0];
        assert_eq!(log.id, receipt.log_id);
        assert_eq!(log.recipient_email, "maria@example.com");
        assert_eq!(log.recipient_name.as_deref(), Some("Maria"));
        assert_eq!(log.email_type, "VERIFICATION");
        assert_eq!(log.subject, "Confirme seu e-mail");
        assert_eq!(log.status, EmailStatus::Sent);
        assert_eq!(log.provider_message_id.as_deref(), Some(message_id));
        assert_eq!(log.status_details.as_deref(), Some("Accepted by provider"));
        assert_eq!(log.user_id, Some(7));
    }

    #[tokio::test]
    async fn provider_failure_settles_the_log_as_failed() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::with_send_failure()));

        let receipt = service
            .send_password_reset_email(PasswordResetMail {
                to: "joao@example.com".to_string(),
                name: None,
                reset_url: "http://localhost:8025/reset-password?token=xyz".to_string(),
                user_id: None,
            })
            .await
            .unwrap();

        assert!(!receipt.is_sent());
        assert!(receipt.provider_message_id.is_none());
        assert!(receipt.detail.as_deref().unwrap().contains("Mock send failure"));

        let logs = all_logs(&db).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, EmailStatus::Failed);
        assert_eq!(logs[0].email_type, "PASSWORD_RESET");
        assert!(logs[0]
            .status_details
            .as_deref()
            .unwrap()
            .contains("Mock send failure"));
        assert!(logs[0].provider_message_id.is_none());
    }

    #[tokio::test]
    async fn unusable_recipient_writes_no_log() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let provider = Arc::new(MockEmailProvider::new());
        let service = service(&db, provider.clone());

        let result = service
            .send_verification_email(VerificationMail {
                to: "not-an-address".to_string(),
                name: None,
                verification_url: "http://localhost:8025/verify-email?token=abc".to_string(),
                user_id: None,
            })
            .await;

        assert!(matches!(result, Err(MailerError::InvalidRecipient(_))));
        assert_eq!(provider.send_call_count(), 0);
        assert!(all_logs(&db).await.is_empty());
    }

    #[tokio::test]
    async fn missing_name_falls_back_to_default_salutation() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        service
            .send_verification_email(VerificationMail {
                to: "anon@example.com".to_string(),
                name: None,
                verification_url: "http://localhost:8025/verify-email?token=abc".to_string(),
                user_id: None,
            })
            .await
            .unwrap();

        let logs = all_logs(&db).await;
        assert_eq!(logs[0].recipient_name.as_deref(), Some("Usuário"));
    }

    #[tokio::test]
    async fn test_sends_are_logged_under_the_test_type() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        let verification = service
            .send_test_email("ops@example.com", Some("Ops"), TestEmailKind::Verification)
            .await
            .unwrap();
        let reset = service
            .send_test_email("ops@example.com", None, TestEmailKind::PasswordReset)
            .await
            .unwrap();

        assert!(verification.is_sent());
        assert!(reset.is_sent());

        let first = service.get(verification.log_id).await.unwrap();
        assert_eq!(first.email_type, "TEST");
        assert_eq!(first.subject, "Teste de verificação de e-mail");

        let second = service.get(reset.log_id).await.unwrap();
        assert_eq!(second.email_type, "TEST");
        assert_eq!(second.subject, "Teste de redefinição de senha");
    }

    #[tokio::test]
    async fn list_filters_by_status_type_and_recipient() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        service
            .send_verification_email(VerificationMail {
                to: "a@example.com".to_string(),
                name: None,
                verification_url: "http://localhost:8025/verify-email?token=1".to_string(),
                user_id: None,
            })
            .await
            .unwrap();
        service
            .send_password_reset_email(PasswordResetMail {
                to: "b@example.com".to_string(),
                name: None,
                reset_url: "http://localhost:8025/reset-password?token=2".to_string(),
                user_id: None,
            })
            .await
            .unwrap();

        let failing = DispatchService::new(
            db.connection_arc(),
            Arc::new(MockEmailProvider::with_send_failure()),
            test_config(),
        );
        failing
            .send_verification_email(VerificationMail {
                to: "c@example.com".to_string(),
                name: None,
                verification_url: "http://localhost:8025/verify-email?token=3".to_string(),
                user_id: None,
            })
            .await
            .unwrap();

        let (sent, total) = service
            .list(ListLogsOptions {
                status: Some(EmailStatus::Sent),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(sent.iter().all(|log| log.status == EmailStatus::Sent));

        let (resets, total) = service
            .list(ListLogsOptions {
                email_type: Some("PASSWORD_RESET".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(resets[0].recipient_email, "b@example.com");

        let (by_email, total) = service
            .list(ListLogsOptions {
                recipient_email: Some("C@EXAMPLE".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(by_email[0].recipient_email, "c@example.com");
        assert_eq!(by_email[0].status, EmailStatus::Failed);
    }

    #[tokio::test]
    async fn list_paginates_and_reports_the_full_count() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        for i in 0..5 {
            service
                .send_verification_email(VerificationMail {
                    to: format!("user{i}@example.com"),
                    name: None,
                    verification_url: format!("http://localhost:8025/verify-email?token={i}"),
                    user_id: None,
                })
                .await
                .unwrap();
        }

        let (page_one, total) = service
            .list(ListLogsOptions {
                page: Some(1),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page_one.len(), 2);

        let (page_three, _) = service
            .list(ListLogsOptions {
                page: Some(3),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page_three.len(), 1);
    }

    #[tokio::test]
    async fn stats_count_each_delivery_state() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        service
            .send_verification_email(VerificationMail {
                to: "a@example.com".to_string(),
                name: None,
                verification_url: "http://localhost:8025/verify-email?token=1".to_string(),
                user_id: None,
            })
            .await
            .unwrap();

        let failing = DispatchService::new(
            db.connection_arc(),
            Arc::new(MockEmailProvider::with_send_failure()),
            test_config(),
        );
        failing
            .send_verification_email(VerificationMail {
                to: "b@example.com".to_string(),
                name: None,
                verification_url: "http://localhost:8025/verify-email?token=2".to_string(),
                user_id: None,
            })
            .await
            .unwrap();

        let stats = service.count_by_status().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn get_reports_missing_logs() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let service = service(&db, Arc::new(MockEmailProvider::new()));

        let result = service.get(9999).await;

        assert!(matches!(result, Err(EmailError::LogNotFound(9999))));
    }
}
