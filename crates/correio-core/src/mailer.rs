//! Cross-crate seam for transactional email delivery.
//!
//! Account flows (registration, password reset) need to send mail but must
//! not depend on the email crate. They consume this trait instead; the email
//! plugin registers the concrete implementation at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Parameters for an account verification email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationMail {
    pub to: String,
    /// Recipient display name. Falls back to a generic salutation when absent.
    pub name: Option<String>,
    /// Fully built confirmation link, token already embedded.
    pub verification_url: String,
    pub user_id: Option<i32>,
}

/// Parameters for a password reset email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetMail {
    pub to: String,
    pub name: Option<String>,
    /// Fully built reset link, token already embedded.
    pub reset_url: String,
    pub user_id: Option<i32>,
}

/// Terminal state of a dispatch attempt as seen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Sent,
    Failed,
}

impl DispatchOutcome {
    /// Uppercase wire form, matching the log status column values.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent => "SENT",
            DispatchOutcome::Failed => "FAILED",
        }
    }
}

/// Outcome of a single dispatch attempt. Every attempt leaves exactly one
/// audit row behind; `log_id` points at it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub log_id: i32,
    pub outcome: DispatchOutcome,
    /// Provider-assigned message id, present when the send was accepted.
    pub provider_message_id: Option<String>,
    /// Failure reason or provider response detail, when available.
    pub detail: Option<String>,
}

impl DispatchReceipt {
    pub fn is_sent(&self) -> bool {
        self.outcome == DispatchOutcome::Sent
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Mailer is not configured: {0}")]
    NotConfigured(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Sends transactional mail and records an audit row per attempt.
///
/// Provider failures are not `Err`: they come back as a `Failed` receipt
/// with the reason in `detail`, so callers can stay fire-and-forget. `Err`
/// is reserved for faults in the pipeline itself, such as the audit row
/// not being writable or an unusable recipient address.
#[async_trait]
pub trait TransactionalMailer: Send + Sync {
    async fn send_verification_email(
        &self,
        mail: VerificationMail,
    ) -> Result<DispatchReceipt, MailerError>;

    async fn send_password_reset_email(
        &self,
        mail: PasswordResetMail,
    ) -> Result<DispatchReceipt, MailerError>;
}

pub type DynTransactionalMailer = Arc<dyn TransactionalMailer>;
