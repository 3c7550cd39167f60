mod service;
pub mod plugin;

pub use plugin::ConfigPlugin;
pub use service::{AppConfig, ConfigError, Environment};
