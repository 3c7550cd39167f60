//! Shared state for auth route handlers.

use std::sync::Arc;

use correio_core::CookieCrypto;
use sea_orm::DatabaseConnection;

use crate::auth_service::AuthService;

pub struct AuthState {
    pub db: Arc<DatabaseConnection>,
    pub auth_service: Arc<AuthService>,
    pub cookie_crypto: Arc<CookieCrypto>,
}

impl AuthState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        auth_service: Arc<AuthService>,
        cookie_crypto: Arc<CookieCrypto>,
    ) -> Self {
        Self {
            db,
            auth_service,
            cookie_crypto,
        }
    }
}
