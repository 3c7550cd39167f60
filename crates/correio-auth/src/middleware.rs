//! Session resolution middleware.
//!
//! Runs before every route. When the request carries a valid encrypted
//! session cookie, the resolved user and an [`AuthContext`] are stored
//! in the request extensions; requests without one continue untouched
//! and are rejected later by [`crate::RequireAuth`] where required.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;
use correio_core::plugin::{CorreioMiddleware, MiddlewareCondition, MiddlewarePriority};
use correio_core::{CookieCrypto, RequestMetadata};
use tracing::debug;

use crate::auth_service::AuthService;
use crate::context::AuthContext;

/// Name of the encrypted session cookie.
pub const SESSION_COOKIE_NAME: &str = "_correio_sid";

pub struct SessionAuthMiddleware {
    auth_service: Arc<AuthService>,
    cookie_crypto: Arc<CookieCrypto>,
}

impl SessionAuthMiddleware {
    pub fn new(auth_service: Arc<AuthService>, cookie_crypto: Arc<CookieCrypto>) -> Self {
        Self {
            auth_service,
            cookie_crypto,
        }
    }
}

/// Pulls the session cookie out of the headers and decrypts it.
pub fn extract_session_token(headers: &HeaderMap, crypto: &CookieCrypto) -> Option<String> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    let encrypted = Cookie::split_parse(cookie_header.to_string())
        .filter_map(|cookie| cookie.ok())
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())?;
    crypto.decrypt(&encrypted).ok()
}

/// Builds the per-request metadata handlers use for cookie flags and
/// logging. Proxy headers win over what the socket saw.
pub fn request_metadata(request: &Request) -> RequestMetadata {
    let headers = request.headers();

    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http")
        .to_string();

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost")
        .to_string();

    let is_secure = scheme == "https";

    RequestMetadata {
        ip_address,
        user_agent,
        scheme,
        host,
        is_secure,
    }
}

impl CorreioMiddleware for SessionAuthMiddleware {
    fn name(&self) -> &str {
        "session_auth_middleware"
    }

    fn plugin_name(&self) -> &str {
        "auth"
    }

    fn priority(&self) -> MiddlewarePriority {
        MiddlewarePriority::Security
    }

    fn condition(&self) -> MiddlewareCondition {
        MiddlewareCondition::Always
    }

    fn execute<'a>(
        &'a self,
        mut request: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, StatusCode>> + Send + 'a>> {
        Box::pin(async move {
            let metadata = request_metadata(&request);
            request.extensions_mut().insert(metadata);

            if let Some(token) = extract_session_token(request.headers(), &self.cookie_crypto) {
                match self.auth_service.verify_session(&token).await {
                    Ok(user) => {
                        debug!(user_id = user.id, "session resolved");
                        let context = AuthContext::new_session(user.clone());
                        request.extensions_mut().insert(user);
                        request.extensions_mut().insert(context);
                    }
                    Err(_) => {
                        debug!("session cookie present but invalid");
                    }
                }
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_prefers_proxy_headers() {
        let request = Request::builder()
            .uri("/api/emails")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-forwarded-proto", "https")
            .header(header::HOST, "correio.dev")
            .header(header::USER_AGENT, "test-agent/1.0")
            .body(axum::body::Body::empty())
            .unwrap();

        let metadata = request_metadata(&request);
        assert_eq!(metadata.ip_address, "203.0.113.9");
        assert_eq!(metadata.scheme, "https");
        assert_eq!(metadata.host, "correio.dev");
        assert_eq!(metadata.user_agent, "test-agent/1.0");
        assert!(metadata.is_secure);
    }

    #[test]
    fn metadata_defaults_without_proxy_headers() {
        let request = Request::builder()
            .uri("/api/emails")
            .body(axum::body::Body::empty())
            .unwrap();

        let metadata = request_metadata(&request);
        assert_eq!(metadata.ip_address, "unknown");
        assert_eq!(metadata.scheme, "http");
        assert!(!metadata.is_secure);
    }

    #[test]
    fn session_token_roundtrips_through_cookie_header() {
        let crypto = CookieCrypto::new(&"a".repeat(64)).unwrap();
        let encrypted = crypto.encrypt("the-session-token").unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            format!("theme=dark; {SESSION_COOKIE_NAME}={encrypted}")
                .parse()
                .unwrap(),
        );

        let token = extract_session_token(&headers, &crypto);
        assert_eq!(token.as_deref(), Some("the-session-token"));

        headers.insert(header::COOKIE, "theme=dark".parse().unwrap());
        assert!(extract_session_token(&headers, &crypto).is_none());
    }
}
