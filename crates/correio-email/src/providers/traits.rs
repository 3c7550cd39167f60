use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::EmailError;

/// A single outbound message handed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailRequest {
    pub from: String,
    pub from_name: Option<String>,
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
}

/// Provider acknowledgement for an accepted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailResponse {
    /// Provider-assigned message id, later echoed back by webhooks.
    pub message_id: String,
}

/// Outbound email transport.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, EmailError>;

    fn provider_name(&self) -> &'static str;
}
