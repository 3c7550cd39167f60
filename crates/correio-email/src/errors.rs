//! Error types for the email pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Email log not found: {0}")]
    LogNotFound(i32),

    #[error("No email log matches provider message id: {0}")]
    UnknownProviderMessageId(String),

    #[error("No user account found for {0}")]
    UserNotFound(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Resend not supported for email type: {0}")]
    UnsupportedResendType(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::Serialization(err.to_string())
    }
}

impl From<correio_core::MailerError> for EmailError {
    fn from(err: correio_core::MailerError) -> Self {
        match err {
            correio_core::MailerError::InvalidRecipient(address) => {
                EmailError::Validation(format!("Invalid recipient address: {address}"))
            }
            correio_core::MailerError::NotConfigured(detail) => EmailError::Configuration(detail),
            correio_core::MailerError::Internal(detail) => EmailError::Provider(detail),
        }
    }
}
