pub mod dispatch_service;
pub mod resend_service;
pub mod webhook_service;

pub use dispatch_service::{DispatchService, ListLogsOptions, LogStats, TestEmailKind};
pub use resend_service::{ResendOutcome, ResendService};
pub use webhook_service::{WebhookEvent, WebhookEventData, WebhookOutcome, WebhookService};
