use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error};

use crate::errors::EmailError;
use crate::providers::traits::{EmailProvider, SendEmailRequest, SendEmailResponse};

/// MailerSend transactional email provider.
///
/// Sends through the `POST /v1/email` endpoint and reads the provider
/// message id from the `x-message-id` response header. Webhook events
/// reference the same id.
pub struct MailerSendProvider {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
}

#[derive(Debug, Serialize)]
struct MailerSendAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct MailerSendEmailRequest {
    from: MailerSendAddress,
    to: Vec<MailerSendAddress>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl MailerSendProvider {
    pub fn new(api_url: &str, api_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }
}

#[async_trait]
impl EmailProvider for MailerSendProvider {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, EmailError> {
        let payload = MailerSendEmailRequest {
            from: MailerSendAddress {
                email: request.from.clone(),
                name: request.from_name.clone(),
            },
            to: vec![MailerSendAddress {
                email: request.to.clone(),
                name: request.to_name.clone(),
            }],
            subject: request.subject.clone(),
            html: request.html.clone(),
            text: request.text.clone(),
        };

        debug!(to = %request.to, subject = %request.subject, "Sending email via MailerSend");

        let response = self
            .client
            .post(format!("{}/v1/email", self.api_url))
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EmailError::Provider(format!("Failed to send email request: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(%status, %body, "MailerSend rejected the email");
            return Err(EmailError::Provider(format!(
                "MailerSend API error ({status}): {body}"
            )));
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string())
            .ok_or_else(|| EmailError::Provider("No message ID returned".to_string()))?;

        debug!(%message_id, "MailerSend accepted the email");

        Ok(SendEmailResponse { message_id })
    }

    fn provider_name(&self) -> &'static str {
        "mailersend"
    }
}
