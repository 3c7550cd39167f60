pub mod auth_service;
pub mod context;
pub mod handlers;
pub mod macros;
pub mod middleware;
pub mod permission_guard;
pub mod permissions;
pub mod plugin;
pub mod state;

pub use auth_service::{AuthError, AuthService, UserAuthError};
pub use context::{AuthContext, AuthSource};
pub use macros::RequireAuth;
pub use middleware::{SessionAuthMiddleware, SESSION_COOKIE_NAME};
pub use permissions::{Permission, Role};
pub use plugin::AuthPlugin;
pub use state::AuthState;
