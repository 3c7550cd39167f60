//! Admin email-log handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use correio_auth::{permission_guard, RequireAuth};
use correio_core::{
    error_builder::{bad_request, internal_server_error, not_found},
    mailer::MailerError,
    problemdetails::Problem,
    ProblemDetails,
};
use correio_entities::EmailStatus;
use tracing::error;

use super::types::{
    AppState, EmailLogResponse, EmailStatsResponse, ListEmailLogsQuery, PaginatedEmailLogsResponse,
    ResendDetails, ResendEmailRequest, ResendEmailResponse, SendTestEmailRequest,
    SendTestEmailResponse,
};
use crate::errors::EmailError;
use crate::services::ListLogsOptions;

/// Configure admin email routes
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/emails", get(list_email_logs))
        .route("/emails/{id}", get(get_email_log))
        .route("/emails/stats", get(get_email_stats))
        .route("/emails/test", post(send_test_email))
        .route("/emails/resend", post(resend_email))
}

/// List email logs with optional filtering
#[utoipa::path(
    tag = "Emails",
    get,
    path = "/emails",
    params(ListEmailLogsQuery),
    responses(
        (status = 200, description = "Page of email logs, newest first", body = PaginatedEmailLogsResponse),
        (status = 400, description = "Unknown status filter", body = ProblemDetails),
        (status = 401, description = "Unauthorized", body = ProblemDetails),
        (status = 403, description = "Insufficient permissions", body = ProblemDetails),
        (status = 500, description = "Internal server error", body = ProblemDetails)
    ),
    security(("session_cookie" = []))
)]
pub async fn list_email_logs(
    RequireAuth(auth): RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEmailLogsQuery>,
) -> Result<impl IntoResponse, Problem> {
    permission_guard!(auth, EmailLogsRead);

    let status = match query.status.as_deref() {
        Some(raw) => Some(EmailStatus::from_str(&raw.to_uppercase()).ok_or_else(|| {
            bad_request()
                .detail(format!("Unknown status filter: {raw}"))
                .build()
        })?),
        None => None,
    };

    let options = ListLogsOptions {
        status,
        email_type: query.email_type,
        recipient_email: query.email,
        page: query.page,
        limit: query.limit,
    };

    let (logs, total) = state.dispatch_service.list(options).await.map_err(|e| {
        error!("Failed to list email logs: {}", e);
        internal_server_error()
            .detail("Failed to list email logs")
            .build()
    })?;

    let response = PaginatedEmailLogsResponse {
        data: logs.into_iter().map(EmailLogResponse::from).collect(),
        total,
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
    };

    Ok(Json(response))
}

/// Get a single email log
#[utoipa::path(
    tag = "Emails",
    get,
    path = "/emails/{id}",
    params(
        ("id" = i32, Path, description = "Email log id")
    ),
    responses(
        (status = 200, description = "Email log details", body = EmailLogResponse),
        (status = 401, description = "Unauthorized", body = ProblemDetails),
        (status = 403, description = "Insufficient permissions", body = ProblemDetails),
        (status = 404, description = "Email log not found", body = ProblemDetails),
        (status = 500, description = "Internal server error", body = ProblemDetails)
    ),
    security(("session_cookie" = []))
)]
pub async fn get_email_log(
    RequireAuth(auth): RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    permission_guard!(auth, EmailLogsRead);

    let log_id: i32 = id
        .parse()
        .map_err(|_| bad_request().detail("Invalid email log id").build())?;

    let log = state.dispatch_service.get(log_id).await.map_err(|e| match e {
        EmailError::LogNotFound(_) => not_found().detail("Email log not found").build(),
        e => {
            error!("Failed to get email log: {}", e);
            internal_server_error()
                .detail("Failed to get email log")
                .build()
        }
    })?;

    Ok(Json(EmailLogResponse::from(log)))
}

/// Get email statistics
#[utoipa::path(
    tag = "Emails",
    get,
    path = "/emails/stats",
    responses(
        (status = 200, description = "Log counts per delivery state", body = EmailStatsResponse),
        (status = 401, description = "Unauthorized", body = ProblemDetails),
        (status = 403, description = "Insufficient permissions", body = ProblemDetails),
        (status = 500, description = "Internal server error", body = ProblemDetails)
    ),
    security(("session_cookie" = []))
)]
pub async fn get_email_stats(
    RequireAuth(auth): RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Problem> {
    permission_guard!(auth, EmailLogsRead);

    let stats = state.dispatch_service.count_by_status().await.map_err(|e| {
        error!("Failed to get email stats: {}", e);
        internal_server_error()
            .detail("Failed to get email statistics")
            .build()
    })?;

    Ok(Json(EmailStatsResponse::from(stats)))
}

/// Send a test email
#[utoipa::path(
    tag = "Emails",
    post,
    path = "/emails/test",
    request_body = SendTestEmailRequest,
    responses(
        (status = 201, description = "Test email dispatched, outcome in body", body = SendTestEmailResponse),
        (status = 400, description = "Invalid recipient address", body = ProblemDetails),
        (status = 401, description = "Unauthorized", body = ProblemDetails),
        (status = 403, description = "Insufficient permissions", body = ProblemDetails),
        (status = 500, description = "Internal server error", body = ProblemDetails)
    ),
    security(("session_cookie" = []))
)]
pub async fn send_test_email(
    RequireAuth(auth): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendTestEmailRequest>,
) -> Result<impl IntoResponse, Problem> {
    permission_guard!(auth, EmailsSend);

    let receipt = state
        .dispatch_service
        .send_test_email(&request.email, request.name.as_deref(), request.style.into())
        .await
        .map_err(|e| match &e {
            MailerError::InvalidRecipient(_) => bad_request().detail(e.to_string()).build(),
            _ => {
                error!("Failed to send test email: {}", e);
                internal_server_error()
                    .detail("Failed to send test email")
                    .build()
            }
        })?;

    let response = SendTestEmailResponse {
        log_id: receipt.log_id,
        status: receipt.outcome.as_str().to_string(),
        provider_message_id: receipt.provider_message_id,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Resend a previously logged email
#[utoipa::path(
    tag = "Emails",
    post,
    path = "/emails/resend",
    request_body = ResendEmailRequest,
    responses(
        (status = 200, description = "Email resent, receipt in body", body = ResendEmailResponse),
        (status = 400, description = "Missing log id, unsupported type, or no token to resend", body = ProblemDetails),
        (status = 401, description = "Unauthorized", body = ProblemDetails),
        (status = 403, description = "Insufficient permissions", body = ProblemDetails),
        (status = 404, description = "Log or user not found", body = ProblemDetails),
        (status = 500, description = "Internal server error", body = ProblemDetails)
    ),
    security(("session_cookie" = []))
)]
pub async fn resend_email(
    RequireAuth(auth): RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResendEmailRequest>,
) -> Result<impl IntoResponse, Problem> {
    permission_guard!(auth, EmailsResend);

    let Some(log_id) = request.log_id else {
        return Err(bad_request().detail("logId is required").build());
    };

    let outcome = state
        .resend_service
        .resend(log_id)
        .await
        .map_err(|e| match &e {
            EmailError::LogNotFound(_) | EmailError::UserNotFound(_) => {
                not_found().detail(e.to_string()).build()
            }
            EmailError::UnsupportedResendType(_) | EmailError::Validation(_) => {
                bad_request().detail(e.to_string()).build()
            }
            _ => {
                error!("Failed to resend email: {}", e);
                internal_server_error()
                    .detail("Failed to resend email")
                    .build()
            }
        })?;

    let response = ResendEmailResponse {
        message: outcome.message,
        details: ResendDetails {
            log_id: outcome.receipt.log_id,
            status: outcome.receipt.outcome.as_str().to_string(),
            provider_message_id: outcome.receipt.provider_message_id,
        },
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockEmailProvider;
    use crate::services::{DispatchService, ResendService, WebhookService};
    use crate::test_support::test_config;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::Utc;
    use correio_auth::AuthContext;
    use correio_database::test_utils::TestDatabase;
    use correio_entities::types::UserRole;
    use correio_entities::users;
    use tower::ServiceExt;

    fn app_state(db: &TestDatabase) -> Arc<AppState> {
        let config = test_config();
        let dispatch = Arc::new(DispatchService::new(
            db.connection_arc(),
            Arc::new(MockEmailProvider::new()),
            config.clone(),
        ));
        Arc::new(AppState {
            dispatch_service: dispatch.clone(),
            webhook_service: Arc::new(WebhookService::new(db.connection_arc(), config.clone())),
            resend_service: Arc::new(ResendService::new(db.connection_arc(), dispatch, config)),
        })
    }

    fn session_user(role: UserRole) -> users::Model {
        users::Model {
            id: 1,
            name: "Admin".to_string(),
            email: "admin@correio.dev".to_string(),
            password_hash: "unused".to_string(),
            role,
            email_verified_at: Some(Utc::now()),
            email_verification_token: None,
            email_verification_expires: None,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn app_with_session(state: Arc<AppState>, role: UserRole) -> Router {
        routes()
            .layer(axum::Extension(AuthContext::new_session(session_user(role))))
            .with_state(state)
    }

    fn anonymous_app(state: Arc<AppState>) -> Router {
        routes().with_state(state)
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> StatusCode {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    #[tokio::test]
    async fn listing_requires_a_session() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let status = get_status(anonymous_app(app_state(&db)), "/emails").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn listing_requires_the_admin_role() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let state = app_state(&db);

        let forbidden =
            get_status(app_with_session(state.clone(), UserRole::User), "/emails").await;
        assert_eq!(forbidden, StatusCode::FORBIDDEN);

        let allowed = get_status(app_with_session(state, UserRole::Admin), "/emails").await;
        assert_eq!(allowed, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_status_filter_is_rejected() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let state = app_state(&db);

        let status = get_status(
            app_with_session(state.clone(), UserRole::Admin),
            "/emails?status=TELEPORTED",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let lowercase_is_fine = get_status(
            app_with_session(state, UserRole::Admin),
            "/emails?status=sent",
        )
        .await;
        assert_eq!(lowercase_is_fine, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_log_is_a_not_found() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let state = app_state(&db);

        let status = get_status(app_with_session(state, UserRole::Admin), "/emails/424242").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_validates_the_recipient() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let state = app_state(&db);

        let bad = post_json(
            app_with_session(state.clone(), UserRole::Admin),
            "/emails/test",
            r#"{"email": "not-an-address"}"#,
        )
        .await;
        assert_eq!(bad, StatusCode::BAD_REQUEST);

        let created = post_json(
            app_with_session(state, UserRole::Admin),
            "/emails/test",
            r#"{"email": "ops@example.com", "style": "password_reset"}"#,
        )
        .await;
        assert_eq!(created, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn resend_requires_a_log_id() {
        let db = TestDatabase::with_migrations().await.unwrap();
        let state = app_state(&db);

        let missing = post_json(
            app_with_session(state.clone(), UserRole::Admin),
            "/emails/resend",
            "{}",
        )
        .await;
        assert_eq!(missing, StatusCode::BAD_REQUEST);

        let unknown = post_json(
            app_with_session(state, UserRole::Admin),
            "/emails/resend",
            r#"{"logId": 424242}"#,
        )
        .await;
        assert_eq!(unknown, StatusCode::NOT_FOUND);
    }
}
