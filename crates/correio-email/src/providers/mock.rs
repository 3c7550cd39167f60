use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::errors::EmailError;
use crate::providers::traits::{EmailProvider, SendEmailRequest, SendEmailResponse};

/// In-memory provider used in development and in tests.
///
/// Accepts every message and fabricates a message id, or fails on demand
/// when built with [`MockEmailProvider::with_send_failure`]. Every request
/// is retained so callers can inspect what would have gone out.
#[derive(Debug, Default)]
pub struct MockEmailProvider {
    send_count: Arc<AtomicUsize>,
    sent_requests: Arc<Mutex<Vec<SendEmailRequest>>>,
    should_fail_send: bool,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_send_failure() -> Self {
        Self {
            should_fail_send: true,
            ..Self::default()
        }
    }

    pub fn send_call_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    /// The most recent request handed to the provider, if any.
    pub fn last_request(&self) -> Option<SendEmailRequest> {
        self.sent_requests
            .lock()
            .expect("request log lock poisoned")
            .last()
            .cloned()
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, request: &SendEmailRequest) -> Result<SendEmailResponse, EmailError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        self.sent_requests
            .lock()
            .expect("request log lock poisoned")
            .push(request.clone());

        if self.should_fail_send {
            return Err(EmailError::Provider("Mock send failure".to_string()));
        }

        let message_id = format!("mock-message-{}", Uuid::new_v4());
        debug!(to = %request.to, %message_id, "Mock provider accepted email");

        Ok(SendEmailResponse { message_id })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_message_ids_and_counts_sends() {
        let provider = MockEmailProvider::new();
        let request = SendEmailRequest {
            from: "noreply@correio.dev".to_string(),
            from_name: Some("Correio".to_string()),
            to: "user@example.com".to_string(),
            to_name: None,
            subject: "Hello".to_string(),
            html: Some("<p>Hello</p>".to_string()),
            text: Some("Hello".to_string()),
        };

        let first = provider.send(&request).await.unwrap();
        let second = provider.send(&request).await.unwrap();

        assert!(first.message_id.starts_with("mock-message-"));
        assert_ne!(first.message_id, second.message_id);
        assert_eq!(provider.send_call_count(), 2);
        assert_eq!(
            provider.last_request().unwrap().to,
            "user@example.com".to_string()
        );
    }

    #[tokio::test]
    async fn mock_provider_can_simulate_failures() {
        let provider = MockEmailProvider::with_send_failure();
        let request = SendEmailRequest {
            from: "noreply@correio.dev".to_string(),
            from_name: None,
            to: "user@example.com".to_string(),
            to_name: None,
            subject: "Hello".to_string(),
            html: None,
            text: Some("Hello".to_string()),
        };

        let result = provider.send(&request).await;

        assert!(matches!(result, Err(EmailError::Provider(_))));
        assert_eq!(provider.send_call_count(), 1);
    }
}
