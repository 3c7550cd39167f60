//! Admin-triggered resend of a previously logged email.
//!
//! A resend always dispatches a fresh message with its own log row; the
//! original row is never touched. What "resend" means depends on the email
//! type: verification reuses the user's pending token, password reset mints
//! a new one, and test sends rebuild a synthetic link.

use std::sync::Arc;

use chrono::{Duration, Utc};
use correio_config::AppConfig;
use correio_core::mailer::{DispatchReceipt, PasswordResetMail, TransactionalMailer, VerificationMail};
use correio_entities::{email_logs, users, EmailType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::errors::EmailError;
use crate::services::dispatch_service::{DispatchService, TestEmailKind};

const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;

/// What a completed resend reports back to the admin endpoint.
#[derive(Debug, Clone)]
pub struct ResendOutcome {
    pub message: String,
    pub receipt: DispatchReceipt,
}

pub struct ResendService {
    db: Arc<DatabaseConnection>,
    dispatch_service: Arc<DispatchService>,
    config: Arc<AppConfig>,
}

impl ResendService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        dispatch_service: Arc<DispatchService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            dispatch_service,
            config,
        }
    }

    pub async fn resend(&self, log_id: i32) -> Result<ResendOutcome, EmailError> {
        let log = email_logs::Entity::find_by_id(log_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(EmailError::LogNotFound(log_id))?;

        let email_type = EmailType::from_str(&log.email_type)
            .ok_or_else(|| EmailError::UnsupportedResendType(log.email_type.clone()))?;

        debug!(log_id, email_type = %email_type, "Resending email");

        match email_type {
            EmailType::Verification => self.resend_verification(&log).await,
            EmailType::PasswordReset => self.resend_password_reset(&log).await,
            EmailType::Test => self.resend_test(&log).await,
        }
    }

    /// Resolves the account behind a log row: the linked `user_id` first,
    /// then the recipient address. Logs outlive account deletion, so both
    /// can miss.
    async fn find_log_user(&self, log: &email_logs::Model) -> Result<users::Model, EmailError> {
        if let Some(user_id) = log.user_id {
            if let Some(user) = users::Entity::find_by_id(user_id)
                .one(self.db.as_ref())
                .await?
            {
                return Ok(user);
            }
        }

        users::Entity::find()
            .filter(users::Column::Email.eq(log.recipient_email.to_lowercase()))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| EmailError::UserNotFound(log.recipient_email.clone()))
    }

    /// Sends the verification mail again with the token the user already
    /// holds. Minting a new token here would invalidate the link in the
    /// first mail, which may still be in the user's inbox.
    async fn resend_verification(
        &self,
        log: &email_logs::Model,
    ) -> Result<ResendOutcome, EmailError> {
        let user = self.find_log_user(log).await?;

        let token = user.email_verification_token.clone().ok_or_else(|| {
            EmailError::Validation("User has no pending verification token to resend".to_string())
        })?;

        let receipt = self
            .dispatch_service
            .send_verification_email(VerificationMail {
                to: user.email.clone(),
                name: Some(user.name.clone()),
                verification_url: self.verification_url(&token),
                user_id: Some(user.id),
            })
            .await?;

        Ok(ResendOutcome {
            message: "Verification email resent".to_string(),
            receipt,
        })
    }

    /// Replaces the user's reset token with a fresh one-hour token and
    /// sends the reset mail for it. The previous link stops working.
    async fn resend_password_reset(
        &self,
        log: &email_logs::Model,
    ) -> Result<ResendOutcome, EmailError> {
        let user = self.find_log_user(log).await?;

        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut active = user.into_active_model();
        active.password_reset_token = Set(Some(token.clone()));
        active.password_reset_expires =
            Set(Some(now + Duration::hours(RESET_TOKEN_LIFETIME_HOURS)));
        active.updated_at = Set(now);
        let user = active.update(self.db.as_ref()).await?;

        let receipt = self
            .dispatch_service
            .send_password_reset_email(PasswordResetMail {
                to: user.email.clone(),
                name: Some(user.name.clone()),
                reset_url: self.reset_url(&token),
                user_id: Some(user.id),
            })
            .await?;

        Ok(ResendOutcome {
            message: "Password reset email resent with a fresh link".to_string(),
            receipt,
        })
    }

    /// Repeats a test send in the same style as the original, judged by
    /// its subject line. The synthetic token embeds the current timestamp,
    /// so it never collides with the original's.
    async fn resend_test(&self, log: &email_logs::Model) -> Result<ResendOutcome, EmailError> {
        let kind = if log.subject.to_lowercase().contains("verifica") {
            TestEmailKind::Verification
        } else {
            TestEmailKind::PasswordReset
        };

        let receipt = self
            .dispatch_service
            .send_test_email(&log.recipient_email, log.recipient_name.as_deref(), kind)
            .await?;

        Ok(ResendOutcome {
            message: "Test email resent".to_string(),
            receipt,
        })
    }

    fn verification_url(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.config.base_url,
            urlencoding::encode(token)
        )
    }

    fn reset_url(&self, token: &str) -> String {
        format!(
            "{}/reset-password?token={}",
            self.config.base_url,
            urlencoding::encode(token)
        )
    }
}
