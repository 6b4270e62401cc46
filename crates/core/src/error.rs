//! Authentication/authorization error model.
//!
//! Every component boundary (identity adapters, stores, middleware) converts its
//! native failures into [`AuthError`] before returning. Backend-specific error
//! types never cross into the middleware or handler layers.

use thiserror::Error;

/// Result type used across the workspace.
pub type AuthResult<T> = Result<T, AuthError>;

/// Why a request could not be authenticated.
///
/// Kept for logging and for the one distinction callers act on (re-auth prompt
/// vs. hard reject). It is never echoed to clients in detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    /// No credential was presented.
    MissingCredential,
    /// The credential was malformed or unknown to the backend.
    InvalidCredential,
    /// The credential referred to a session that no longer exists.
    SessionNotFound,
    /// The session exists but is expired or was cleared.
    SessionInactive,
    /// The credential is well-formed but past its expiry.
    Expired,
    /// The credential was issued for another tenant.
    TenantMismatch,
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::SessionNotFound => "session_not_found",
            Self::SessionInactive => "session_inactive",
            Self::Expired => "expired",
            Self::TenantMismatch => "tenant_mismatch",
        }
    }
}

impl core::fmt::Display for UnauthenticatedReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error taxonomy for the identity/authorization core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No credential, or the credential did not verify.
    #[error("unauthenticated: {0}")]
    Unauthenticated(UnauthenticatedReason),

    /// Authenticated, but the role or membership is insufficient.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Authenticated with a sufficient role, but the assurance level is too low.
    #[error("step-up authentication required")]
    StepUpRequired,

    #[error("tenant not found")]
    TenantNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("api token not found")]
    TokenNotFound,

    /// Duplicate email/identifier/subdomain.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The identity backend itself failed or could not be reached.
    #[error("identity backend unavailable: {0}")]
    BackendUnavailable(String),

    /// State conflict (e.g. double revocation of a token).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Malformed input.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The relational store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl AuthError {
    pub fn unauthenticated(reason: UnauthenticatedReason) -> Self {
        Self::Unauthenticated(reason)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Stable machine-readable code for clients.
    ///
    /// `Unauthenticated` collapses to a single code except for the inactive
    /// session case, which clients answer with a re-authentication prompt.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(UnauthenticatedReason::SessionInactive) => "session_inactive",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::StepUpRequired => "step_up_required",
            Self::TenantNotFound => "tenant_not_found",
            Self::UserNotFound => "user_not_found",
            Self::TokenNotFound => "token_not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Conflict(_) => "conflict",
            Self::Invalid(_) => "invalid_request",
            Self::Store(_) => "store_error",
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            Self::Unauthenticated(UnauthenticatedReason::SessionInactive) => {
                "session is no longer active; sign in again".to_string()
            }
            Self::Unauthenticated(_) => "authentication required".to_string(),
            Self::StepUpRequired => {
                "this action requires re-verification at a higher assurance level".to_string()
            }
            Self::BackendUnavailable(_) => "identity backend unavailable".to_string(),
            Self::Store(_) => "internal storage error".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated(_))
    }
}
