//! Guard macro for permission-gated handlers.

/// Returns early from the surrounding handler with a `403` problem
/// response when the authenticated caller lacks the given permission.
///
/// ```ignore
/// permission_guard!(auth, EmailsResend);
/// ```
#[macro_export]
macro_rules! permission_guard {
    ($auth:expr, $permission:ident) => {
        if !$auth.has_permission(&$crate::permissions::Permission::$permission) {
            return Err(correio_core::error_builder::ErrorBuilder::new(
                ::axum::http::StatusCode::FORBIDDEN,
            )
            .type_("https://correio.dev/probs/insufficient-permissions")
            .title("Insufficient Permissions")
            .detail(format!(
                "This operation requires the {} permission",
                $crate::permissions::Permission::$permission
            ))
            .value(
                "required_permission",
                $crate::permissions::Permission::$permission,
            )
            .value("user_role", $auth.effective_role.to_string())
            .build());
        }
    };
}
