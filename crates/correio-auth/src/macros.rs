//! Extractors used by authenticated route handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use correio_core::problemdetails::{self, Problem};

use crate::context::AuthContext;

/// Rejects the request with `401` unless the session middleware has
/// resolved an [`AuthContext`] for it.
///
/// ```ignore
/// async fn me(RequireAuth(auth): RequireAuth) -> Json<UserResponse> {
///     Json(auth.user.into())
/// }
/// ```
pub struct RequireAuth(pub AuthContext);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Problem;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .map(RequireAuth)
            .ok_or_else(|| {
                problemdetails::new(StatusCode::UNAUTHORIZED)
                    .with_type("https://correio.dev/probs/authentication-required")
                    .with_title("Authentication Required")
                    .with_detail("Sign in to access this resource")
            })
    }
}
