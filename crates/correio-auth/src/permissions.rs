//! Roles and the permissions they grant.
//!
//! Authorization is role based: the handlers ask for a [`Permission`]
//! and the caller's [`Role`] decides whether it is granted. All email
//! administration permissions are reserved for admins.

use correio_entities::types::UserRole;
use serde::{Deserialize, Serialize};

/// Fine-grained permissions checked by route handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// List and inspect email delivery logs.
    EmailLogsRead,
    /// Send test emails through the provider.
    EmailsSend,
    /// Resend a previously logged email.
    EmailsResend,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Permission::EmailLogsRead => "email_logs:read",
            Permission::EmailsSend => "emails:send",
            Permission::EmailsResend => "emails:resend",
        };
        write!(f, "{name}")
    }
}

/// Effective role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn has_permission(&self, permission: &Permission) -> bool {
        match self {
            Role::Admin => true,
            Role::User => match permission {
                Permission::EmailLogsRead
                | Permission::EmailsSend
                | Permission::EmailsResend => false,
            },
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Role::Admin,
            UserRole::User => Role::User,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_permission() {
        for permission in [
            Permission::EmailLogsRead,
            Permission::EmailsSend,
            Permission::EmailsResend,
        ] {
            assert!(Role::Admin.has_permission(&permission));
        }
    }

    #[test]
    fn regular_user_holds_no_admin_permission() {
        for permission in [
            Permission::EmailLogsRead,
            Permission::EmailsSend,
            Permission::EmailsResend,
        ] {
            assert!(!Role::User.has_permission(&permission));
        }
    }

    #[test]
    fn role_maps_from_entity_role() {
        assert_eq!(Role::from(UserRole::Admin), Role::Admin);
        assert_eq!(Role::from(UserRole::User), Role::User);
    }
}
