//! Core utilities and types shared across all Correio crates

pub mod error;
pub mod error_builder;
pub mod mailer;
pub mod plugin;
pub mod problemdetails;
pub use problemdetails::ProblemDetails;
pub mod types;
mod cookie_crypto;
mod request_metadata;

// Re-export commonly used types
pub use error::*;
pub use error_builder::*;

// Re-export external dependencies
pub use anyhow;
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
pub use uuid;

pub use cookie_crypto::{CookieCrypto, CryptoError};
pub use request_metadata::RequestMetadata;
pub use mailer::{
    DispatchOutcome, DispatchReceipt, DynTransactionalMailer, MailerError, PasswordResetMail,
    TransactionalMailer, VerificationMail,
};
pub use types::*;

// Re-export standard datetime type for use across all crates
pub use types::DBDateTime;
