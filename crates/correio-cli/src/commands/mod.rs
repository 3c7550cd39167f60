pub mod reset_password;
pub mod serve;

pub use reset_password::ResetPasswordCommand;
pub use serve::ServeCommand;
