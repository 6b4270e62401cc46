//! Shared HTTP plumbing for the REST backends.
//!
//! `reqwest` errors stop here: callers only ever see [`AuthError`].

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use warden_core::{AuthError, AuthResult};

pub(crate) fn build_http_client(timeout: Duration) -> AuthResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AuthError::backend(format!("http client: {e}")))
}

/// Transport-level failure (connect, timeout, body read).
pub(crate) fn transport_error(op: &'static str, e: reqwest::Error) -> AuthError {
    tracing::warn!(op, error = %e, "identity backend request failed");
    if e.is_timeout() {
        AuthError::backend(format!("{op}: timed out"))
    } else {
        AuthError::backend(format!("{op}: {e}"))
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(op: &'static str, resp: Response) -> AuthResult<T> {
    resp.json::<T>().await.map_err(|e| {
        tracing::warn!(op, error = %e, "identity backend returned an unexpected body");
        AuthError::backend(format!("{op}: malformed response"))
    })
}

/// Read a body as JSON, tolerating empty or non-JSON bodies.
pub(crate) async fn json_or_null(resp: Response) -> serde_json::Value {
    resp.json::<serde_json::Value>().await.unwrap_or(serde_json::Value::Null)
}

/// Fallback mapping for statuses the adapter has no specific meaning for.
pub(crate) fn unexpected_status(op: &'static str, status: StatusCode, detail: &str) -> AuthError {
    if status.is_server_error() || status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        // 401/403 on admin calls mean our own credentials were rejected.
        tracing::warn!(op, %status, detail, "identity backend error");
        AuthError::backend(format!("{op}: backend returned {status}"))
    } else {
        AuthError::invalid(format!("{op}: {detail}"))
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
