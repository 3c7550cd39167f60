//! Handler types for the email pipeline

use std::sync::Arc;

use correio_entities::email_logs;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::services::{DispatchService, LogStats, ResendService, TestEmailKind, WebhookService};

/// Application state for email handlers
pub struct AppState {
    pub dispatch_service: Arc<DispatchService>,
    pub webhook_service: Arc<WebhookService>,
    pub resend_service: Arc<ResendService>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListEmailLogsQuery {
    /// Page number, starting at 1
    pub page: Option<u64>,
    /// Rows per page, capped at 100
    pub limit: Option<u64>,
    /// Filter by delivery status, e.g. SENT or BOUNCED
    pub status: Option<String>,
    /// Filter by email category, e.g. VERIFICATION
    #[serde(rename = "type")]
    pub email_type: Option<String>,
    /// Substring filter on the recipient address, case-insensitive
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailLogResponse {
    pub id: i32,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub email_type: String,
    pub subject: String,
    pub status: String,
    pub status_details: Option<String>,
    pub provider_message_id: Option<String>,
    pub user_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<email_logs::Model> for EmailLogResponse {
    fn from(log: email_logs::Model) -> Self {
        Self {
            id: log.id,
            recipient_email: log.recipient_email,
            recipient_name: log.recipient_name,
            email_type: log.email_type,
            subject: log.subject,
            status: log.status.as_str().to_string(),
            status_details: log.status_details,
            provider_message_id: log.provider_message_id,
            user_id: log.user_id,
            created_at: log.created_at.to_rfc3339(),
            updated_at: log.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedEmailLogsResponse {
    pub data: Vec<EmailLogResponse>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmailStatsResponse {
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

impl From<LogStats> for EmailStatsResponse {
    fn from(stats: LogStats) -> Self {
        Self {
            total: stats.total,
            pending: stats.pending,
            sent: stats.sent,
            failed: stats.failed,
            delivered: stats.delivered,
            opened: stats.opened,
            clicked: stats.clicked,
            bounced: stats.bounced,
            spam: stats.spam,
            blocked: stats.blocked,
        }
    }
}

/// Template style exercised by a test send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestEmailStyle {
    #[default]
    Verification,
    PasswordReset,
}

impl From<TestEmailStyle> for TestEmailKind {
    fn from(style: TestEmailStyle) -> Self {
        match style {
            TestEmailStyle::Verification => TestEmailKind::Verification,
            TestEmailStyle::PasswordReset => TestEmailKind::PasswordReset,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendTestEmailRequest {
    #[schema(example = "ops@example.com")]
    pub email: String,
    pub name: Option<String>,
    /// Defaults to a verification-style test
    #[serde(default)]
    pub style: TestEmailStyle,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendTestEmailResponse {
    pub log_id: i32,
    pub status: String,
    pub provider_message_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendEmailRequest {
    /// Id of the log row to resend
    #[serde(alias = "logId")]
    pub log_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResendDetails {
    pub log_id: i32,
    pub status: String,
    pub provider_message_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResendEmailResponse {
    pub message: String,
    pub details: ResendDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAckResponse {
    pub message: String,
}
