pub mod mailersend;
pub mod mock;
pub mod traits;

pub use mailersend::MailerSendProvider;
pub use mock::MockEmailProvider;
pub use traits::{EmailProvider, SendEmailRequest, SendEmailResponse};
