//! HTTP handlers for account and session endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use correio_core::problemdetails::{self, Problem};
use correio_core::RequestMetadata;
use correio_entities::users;
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::auth_service::{RegisterUserData, UserAuthError};
use crate::macros::RequireAuth;
use crate::middleware::extract_session_token;
use crate::state::AuthState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "maria@example.com")]
    pub email: String,
    #[schema(example = "Maria Silva")]
    pub name: String,
    pub password: String,
}

impl From<RegisterRequest> for RegisterUserData {
    fn from(request: RegisterRequest) -> Self {
        RegisterUserData {
            email: request.email,
            name: request.name,
            password: request.password,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "maria@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct VerifyEmailQuery {
    /// Verification token from the emailed link.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    #[schema(example = "USER")]
    pub role: String,
    pub email_verified: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        UserResponse {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.as_str().to_string(),
            email_verified: user.email_verified_at.is_some(),
            created_at: user.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email queued", body = UserResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Registration failed")
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, Problem> {
    if !request.email.contains('@') {
        return Err(problemdetails::new(StatusCode::BAD_REQUEST)
            .with_title("Invalid Email")
            .with_detail("A valid email address is required"));
    }

    if request.password.len() < 8 {
        return Err(problemdetails::new(StatusCode::BAD_REQUEST)
            .with_title("Password Too Short")
            .with_detail("Password must be at least 8 characters long"));
    }

    match state.auth_service.register_user(request.into()).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(UserResponse::from(user)))),
        Err(UserAuthError::EmailAlreadyRegistered) => {
            Err(problemdetails::new(StatusCode::CONFLICT)
                .with_title("Email Already Registered")
                .with_detail("An account with this email address already exists"))
        }
        Err(err) => {
            error!(error = %err, "registration failed");
            Err(problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                .with_title("Registration Failed"))
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, session cookie set", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Login failed")
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<Arc<AuthState>>,
    Extension(metadata): Extension<RequestMetadata>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, Problem> {
    let user = match state
        .auth_service
        .login(&request.email, &request.password)
        .await
    {
        Ok(user) => user,
        Err(UserAuthError::InvalidCredentials) => {
            return Err(problemdetails::new(StatusCode::UNAUTHORIZED)
                .with_title("Invalid Credentials")
                .with_detail("Email or password is incorrect"));
        }
        Err(err) => {
            error!(error = %err, "login failed");
            return Err(
                problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR).with_title("Login Failed")
            );
        }
    };

    let session_token = state
        .auth_service
        .create_session(user.id)
        .await
        .map_err(|err| {
            error!(error = %err, "session creation failed");
            problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR).with_title("Login Failed")
        })?;

    let encrypted_token = state.cookie_crypto.encrypt(&session_token).map_err(|err| {
        error!(error = %err, "session token encryption failed");
        problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR).with_title("Login Failed")
    })?;

    let headers = state
        .auth_service
        .create_session_cookie(&encrypted_token, metadata.is_secure);

    Ok((
        headers,
        Json(AuthResponse {
            success: true,
            message: "Login successful".to_string(),
            user_id: Some(user.id),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session terminated", body = AuthResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
pub async fn logout(
    RequireAuth(_auth): RequireAuth,
    State(state): State<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Problem> {
    if let Some(token) = extract_session_token(&headers, &state.cookie_crypto) {
        if let Err(err) = state.auth_service.logout(&token).await {
            error!(error = %err, "logout failed");
            return Err(
                problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR).with_title("Logout Failed")
            );
        }
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static(
            "_correio_sid=; Max-Age=0; Path=/; HttpOnly; Secure; SameSite=Strict",
        ),
    );

    Ok((
        response_headers,
        Json(AuthResponse {
            success: true,
            message: "Logged out".to_string(),
            user_id: None,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Authentication",
    security(("session_cookie" = []))
)]
pub async fn me(RequireAuth(auth): RequireAuth) -> Json<UserResponse> {
    Json(UserResponse::from(auth.user))
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists", body = MessageResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_password_reset(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<PasswordResetRequest>,
) -> impl IntoResponse {
    // Same response either way so the endpoint cannot be used to probe
    // for registered addresses.
    match state.auth_service.request_password_reset(&request.email).await {
        Ok(_) | Err(_) => Json(MessageResponse {
            message: "If the address has an account, a reset email is on its way".to_string(),
        }),
    }
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/verify",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Invalid or expired token"),
        (status = 500, description = "Reset failed")
    ),
    tag = "Authentication"
)]
pub async fn confirm_password_reset(
    State(state): State<Arc<AuthState>>,
    Json(request): Json<PasswordResetConfirmRequest>,
) -> Result<Json<MessageResponse>, Problem> {
    match state
        .auth_service
        .reset_password(&request.token, &request.password)
        .await
    {
        Ok(()) => Ok(Json(MessageResponse {
            message: "Password updated".to_string(),
        })),
        Err(UserAuthError::InvalidToken) => Err(problemdetails::new(StatusCode::BAD_REQUEST)
            .with_title("Invalid Token")
            .with_detail("The reset token is invalid or has expired")),
        Err(err) => {
            error!(error = %err, "password reset failed");
            Err(problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR).with_title("Reset Failed"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/verify-email",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Invalid or expired token"),
        (status = 500, description = "Verification failed")
    ),
    tag = "Authentication"
)]
pub async fn verify_email(
    State(state): State<Arc<AuthState>>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<Json<MessageResponse>, Problem> {
    match state.auth_service.verify_email(&query.token).await {
        Ok(_) => Ok(Json(MessageResponse {
            message: "Email verified".to_string(),
        })),
        Err(UserAuthError::InvalidToken) => Err(problemdetails::new(StatusCode::BAD_REQUEST)
            .with_title("Invalid Token")
            .with_detail("The verification token is invalid or has expired")),
        Err(err) => {
            error!(error = %err, "email verification failed");
            Err(problemdetails::new(StatusCode::INTERNAL_SERVER_ERROR)
                .with_title("Verification Failed"))
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        register,
        login,
        logout,
        me,
        request_password_reset,
        confirm_password_reset,
        verify_email
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        PasswordResetRequest,
        PasswordResetConfirmRequest,
        AuthResponse,
        MessageResponse,
        UserResponse
    )),
    tags(
        (name = "Authentication", description = "Accounts, sessions and account email tokens")
    )
)]
pub struct AuthApiDoc;

pub fn configure_routes() -> Router<Arc<AuthState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset/request", post(request_password_reset))
        .route("/auth/password-reset/verify", post(confirm_password_reset))
        .route("/auth/verify-email", get(verify_email))
        .route("/user/me", get(me))
}
