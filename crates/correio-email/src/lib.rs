//! Transactional email pipeline for Correio
//!
//! This crate owns everything that touches outbound account email:
//! - Dispatch of verification, password reset and test emails through the
//!   configured provider, with one audit log row per attempt
//! - The provider webhook endpoint that advances log statuses as
//!   delivery and engagement events arrive
//! - Admin endpoints for browsing logs and resending emails

pub mod errors;
pub mod handlers;
pub mod plugin;
pub mod providers;
pub mod services;
pub mod templates;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use errors::EmailError;
pub use plugin::EmailPlugin;
pub use providers::{EmailProvider, MailerSendProvider, MockEmailProvider};
pub use services::{
    DispatchService, ResendOutcome, ResendService, TestEmailKind, WebhookEvent, WebhookOutcome,
    WebhookService,
};
