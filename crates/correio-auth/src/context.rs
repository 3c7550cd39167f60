//! Authenticated request context.
//!
//! The session middleware resolves the caller and stores an
//! [`AuthContext`] in the request extensions. Handlers receive it
//! through the [`crate::RequireAuth`] extractor.

use correio_entities::users;

use crate::permissions::{Permission, Role};

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Session cookie issued at login.
    Session,
}

/// Resolved identity of an authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The user the session belongs to.
    pub user: users::Model,
    /// How the request authenticated.
    pub source: AuthSource,
    /// Role used for permission checks.
    pub effective_role: Role,
}

impl AuthContext {
    pub fn new_session(user: users::Model) -> Self {
        let effective_role = Role::from(user.role);
        Self {
            user,
            source: AuthSource::Session,
            effective_role,
        }
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.effective_role.has_permission(permission)
    }

    pub fn is_admin(&self) -> bool {
        self.effective_role.is_admin()
    }

    pub fn user_id(&self) -> i32 {
        self.user.id
    }
}
