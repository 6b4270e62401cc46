use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use serde_json::json;

use warden_core::AuthError;

pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden(_) | AuthError::StepUpRequired => StatusCode::FORBIDDEN,
        AuthError::TenantNotFound | AuthError::UserNotFound | AuthError::TokenNotFound => StatusCode::NOT_FOUND,
        AuthError::AlreadyExists(_) | AuthError::Conflict(_) => StatusCode::CONFLICT,
        AuthError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
        AuthError::Invalid(_) => StatusCode::BAD_REQUEST,
        AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render an [`AuthError`] as the standard JSON error body.
///
/// Server-side failures are logged here with their internal detail; clients
/// only ever see [`AuthError::public_message`].
pub fn auth_error_to_response(err: AuthError) -> axum::response::Response {
    let status = status_for(&err);
    match &err {
        AuthError::Store(_) => tracing::error!(error = %err, "request failed"),
        AuthError::BackendUnavailable(_) => tracing::warn!(error = %err, "identity backend call failed"),
        _ => tracing::debug!(code = err.code(), "request rejected"),
    }

    let mut response = json_error(status, err.code(), err.public_message());
    if err.is_unauthenticated() {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    response
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
