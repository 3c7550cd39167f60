use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Account role. The platform only distinguishes administrators from
/// regular users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum UserRole {
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    #[sea_orm(string_value = "USER")]
    User,
}

impl Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::User => "USER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(UserRole::Admin),
            "USER" => Some(UserRole::User),
            _ => None,
        }
    }
}

/// Delivery lifecycle state of an email log row.
///
/// States are ordered by rank: an email starts `Pending`, becomes `Sent`
/// or `Failed` once the dispatch attempt finishes, then advances through
/// provider events (`Delivered`, then engagement or bounce outcomes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum EmailStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "SENT")]
    Sent,
    #[sea_orm(string_value = "FAILED")]
    Failed,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "OPENED")]
    Opened,
    #[sea_orm(string_value = "CLICKED")]
    Clicked,
    #[sea_orm(string_value = "BOUNCED")]
    Bounced,
    #[sea_orm(string_value = "SPAM")]
    Spam,
    #[sea_orm(string_value = "BLOCKED")]
    Blocked,
}

impl Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "PENDING",
            EmailStatus::Sent => "SENT",
            EmailStatus::Failed => "FAILED",
            EmailStatus::Delivered => "DELIVERED",
            EmailStatus::Opened => "OPENED",
            EmailStatus::Clicked => "CLICKED",
            EmailStatus::Bounced => "BOUNCED",
            EmailStatus::Spam => "SPAM",
            EmailStatus::Blocked => "BLOCKED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(EmailStatus::Pending),
            "SENT" => Some(EmailStatus::Sent),
            "FAILED" => Some(EmailStatus::Failed),
            "DELIVERED" => Some(EmailStatus::Delivered),
            "OPENED" => Some(EmailStatus::Opened),
            "CLICKED" => Some(EmailStatus::Clicked),
            "BOUNCED" => Some(EmailStatus::Bounced),
            "SPAM" => Some(EmailStatus::Spam),
            "BLOCKED" => Some(EmailStatus::Blocked),
            _ => None,
        }
    }

    /// Position in the delivery lifecycle. Engagement and bounce outcomes
    /// share the top rank because providers report them in any order.
    pub fn rank(&self) -> u8 {
        match self {
            EmailStatus::Pending => 0,
            EmailStatus::Sent | EmailStatus::Failed => 1,
            EmailStatus::Delivered => 2,
            EmailStatus::Opened
            | EmailStatus::Clicked
            | EmailStatus::Bounced
            | EmailStatus::Spam
            | EmailStatus::Blocked => 3,
        }
    }

    /// Whether moving from `self` to `next` advances (or re-applies) the
    /// lifecycle. Webhook events can arrive out of order; regressions such
    /// as DELIVERED after OPENED are rejected, while replays of the same
    /// rank are accepted so reprocessing stays idempotent.
    pub fn can_transition_to(&self, next: EmailStatus) -> bool {
        next.rank() >= self.rank()
    }
}

/// Known email categories. The `email_type` column itself stays free-form
/// so new categories can be introduced without a migration; this enum only
/// classifies the types the resend flow knows how to rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailType {
    Verification,
    PasswordReset,
    Test,
}

impl Display for EmailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailType::Verification => "VERIFICATION",
            EmailType::PasswordReset => "PASSWORD_RESET",
            EmailType::Test => "TEST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "VERIFICATION" => Some(EmailType::Verification),
            "PASSWORD_RESET" => Some(EmailType::PasswordReset),
            "TEST" => Some(EmailType::Test),
            _ => None,
        }
    }
}
