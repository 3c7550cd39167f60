//! User accounts, credentials and session management.
//!
//! Passwords are hashed with argon2id. Email verification and password
//! reset both work through single-use tokens stored on the user row; the
//! corresponding mail is handed to the [`TransactionalMailer`] seam and
//! failures there never fail the account operation itself.
//!
//! [`TransactionalMailer`]: correio_core::TransactionalMailer

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use cookie::{Cookie, SameSite};
use correio_config::AppConfig;
use correio_core::{DynTransactionalMailer, PasswordResetMail, VerificationMail};
use correio_entities::types::UserRole;
use correio_entities::{sessions, users};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, TransactionTrait,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::SESSION_COOKIE_NAME;

const SESSION_TOKEN_LENGTH: usize = 64;
const SESSION_LIFETIME_DAYS: i64 = 30;
const VERIFICATION_TOKEN_LIFETIME_HOURS: i64 = 24;
const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Database error: {reason}")]
    DatabaseError { reason: String },

    #[error("Record not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,
}

impl From<DbErr> for AuthError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => AuthError::NotFound,
            other => AuthError::DatabaseError {
                reason: other.to_string(),
            },
        }
    }
}

/// Errors from account flows: registration, login, tokens.
#[derive(Debug, thiserror::Error)]
pub enum UserAuthError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Password hashing failed")]
    PasswordHashError,
}

/// Input for [`AuthService::register_user`].
#[derive(Debug, Clone)]
pub struct RegisterUserData {
    pub email: String,
    pub name: String,
    pub password: String,
}

pub struct AuthService {
    db: Arc<DatabaseConnection>,
    mailer: DynTransactionalMailer,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        mailer: DynTransactionalMailer,
        config: Arc<AppConfig>,
    ) -> Self {
        Self { db, mailer, config }
    }

    /// Creates a session for the user and returns the opaque token.
    pub async fn create_session(&self, user_id: i32) -> Result<String, AuthError> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LENGTH)
            .map(char::from)
            .collect();

        let session = sessions::ActiveModel {
            user_id: Set(user_id),
            token: Set(token.clone()),
            expires_at: Set(Utc::now() + Duration::days(SESSION_LIFETIME_DAYS)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        session.insert(self.db.as_ref()).await?;

        debug!(user_id, "session created");
        Ok(token)
    }

    /// Resolves a session token to its user. Expired or unknown tokens
    /// are rejected as unauthorized.
    pub async fn verify_session(&self, token: &str) -> Result<users::Model, AuthError> {
        let session = sessions::Entity::find()
            .filter(sessions::Column::Token.eq(token))
            .filter(sessions::Column::ExpiresAt.gt(Utc::now()))
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::Unauthorized)?;

        users::Entity::find_by_id(session.user_id)
            .one(self.db.as_ref())
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    /// Builds the `Set-Cookie` headers for an issued session token.
    /// The caller passes the encrypted token, never the raw one.
    pub fn create_session_cookie(&self, encrypted_token: &str, is_secure: bool) -> HeaderMap {
        let cookie = Cookie::build((SESSION_COOKIE_NAME, encrypted_token))
            .http_only(true)
            .path("/")
            .max_age(cookie::time::Duration::days(SESSION_LIFETIME_DAYS))
            .same_site(SameSite::Strict)
            .secure(is_secure)
            .build();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::SET_COOKIE,
            cookie
                .to_string()
                .parse()
                .expect("session cookie serializes to a valid header value"),
        );
        headers
    }

    /// Deletes the session behind the token. Unknown tokens are a no-op.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        let txn = self.db.begin().await?;
        sessions::Entity::delete_many()
            .filter(sessions::Column::Token.eq(token))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        Ok(())
    }

    /// Registers a new account and sends the verification email.
    ///
    /// The email address is normalized to lowercase and must be unused.
    /// The verification token is a UUID valid for 24 hours; delivery
    /// failures do not fail the registration.
    pub async fn register_user(
        &self,
        data: RegisterUserData,
    ) -> Result<users::Model, UserAuthError> {
        let email = data.email.trim().to_lowercase();

        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(email.clone()))
            .one(self.db.as_ref())
            .await?;
        if existing.is_some() {
            return Err(UserAuthError::EmailAlreadyRegistered);
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(data.password.as_bytes(), &salt)
            .map_err(|_| UserAuthError::PasswordHashError)?
            .to_string();

        let now = Utc::now();
        let user = users::ActiveModel {
            name: Set(data.name.clone()),
            email: Set(email.clone()),
            password_hash: Set(password_hash),
            role: Set(UserRole::User),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let user = user.insert(self.db.as_ref()).await?;

        let verification_token = Uuid::new_v4().to_string();
        let mut active = user.into_active_model();
        active.email_verification_token = Set(Some(verification_token.clone()));
        active.email_verification_expires =
            Set(Some(now + Duration::hours(VERIFICATION_TOKEN_LIFETIME_HOURS)));
        let user = active.update(self.db.as_ref()).await?;

        let verification_url = format!(
            "{}/verify-email?token={}",
            self.config.base_url,
            urlencoding::encode(&verification_token)
        );
        let _ = self
            .mailer
            .send_verification_email(VerificationMail {
                to: user.email.clone(),
                name: Some(user.name.clone()),
                verification_url,
                user_id: Some(user.id),
            })
            .await;

        Ok(user)
    }

    /// Checks credentials and returns the user on success.
    pub async fn login(&self, email: &str, password: &str) -> Result<users::Model, UserAuthError> {
        let email = email.trim().to_lowercase();
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email.clone()))
            .one(self.db.as_ref())
            .await?
            .ok_or(UserAuthError::InvalidCredentials)?;

        if !user.password_hash.starts_with("$argon2") {
            warn!(%email, "login rejected: stored hash is not argon2");
            return Err(UserAuthError::InvalidCredentials);
        }

        let parsed =
            PasswordHash::new(&user.password_hash).map_err(|_| UserAuthError::PasswordHashError)?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_err()
        {
            warn!(%email, "login failed: password mismatch");
            return Err(UserAuthError::InvalidCredentials);
        }

        Ok(user)
    }

    /// Issues a password reset token and mails the reset link.
    ///
    /// Always succeeds from the caller's point of view so the endpoint
    /// does not reveal which addresses have accounts. A new token
    /// overwrites any previous one and is valid for one hour.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), UserAuthError> {
        let email = email.trim().to_lowercase();
        let Some(user) = users::Entity::find()
            .filter(users::Column::Email.eq(email.clone()))
            .one(self.db.as_ref())
            .await?
        else {
            debug!(%email, "password reset requested for unknown address");
            return Ok(());
        };

        let reset_token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut active = user.into_active_model();
        active.password_reset_token = Set(Some(reset_token.clone()));
        active.password_reset_expires =
            Set(Some(now + Duration::hours(RESET_TOKEN_LIFETIME_HOURS)));
        active.updated_at = Set(now);
        let user = active.update(self.db.as_ref()).await?;

        let reset_url = format!(
            "{}/reset-password?token={}",
            self.config.base_url,
            urlencoding::encode(&reset_token)
        );
        let _ = self
            .mailer
            .send_password_reset_email(PasswordResetMail {
                to: user.email.clone(),
                name: Some(user.name.clone()),
                reset_url,
                user_id: Some(user.id),
            })
            .await;

        Ok(())
    }

    /// Consumes a reset token and replaces the password. The token and
    /// its expiry are cleared so it cannot be replayed.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), UserAuthError> {
        let user = users::Entity::find()
            .filter(users::Column::PasswordResetToken.eq(token))
            .one(self.db.as_ref())
            .await?
            .ok_or(UserAuthError::InvalidToken)?;

        match user.password_reset_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(UserAuthError::InvalidToken),
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(new_password.as_bytes(), &salt)
            .map_err(|_| UserAuthError::PasswordHashError)?
            .to_string();

        let mut active = user.into_active_model();
        active.password_hash = Set(password_hash);
        active.password_reset_token = Set(None);
        active.password_reset_expires = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;

        Ok(())
    }

    /// Consumes a verification token and marks the account verified.
    pub async fn verify_email(&self, token: &str) -> Result<users::Model, UserAuthError> {
        let user = users::Entity::find()
            .filter(users::Column::EmailVerificationToken.eq(token))
            .one(self.db.as_ref())
            .await?
            .ok_or(UserAuthError::InvalidToken)?;

        match user.email_verification_expires {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(UserAuthError::InvalidToken),
        }

        let now = Utc::now();
        let mut active = user.into_active_model();
        active.email_verified_at = Set(Some(now));
        active.email_verification_token = Set(None);
        active.email_verification_expires = Set(None);
        active.updated_at = Set(now);
        let user = active.update(self.db.as_ref()).await?;

        debug!(user_id = user.id, "email verified");
        Ok(user)
    }
}
