pub mod types;
pub mod users;
pub mod sessions;
pub mod email_logs;

pub use types::*;
