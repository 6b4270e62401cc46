//! Request pipeline, outermost first: tenant resolution, authorization,
//! tenant membership.

use axum::extract::{OriginalUri, Request};

pub mod auth;
pub mod credentials;
pub mod resolve;
pub mod tenant;

pub use auth::auth_middleware;
pub use resolve::resolve_tenant_middleware;
pub use tenant::tenant_middleware;

/// Path as the client sent it, before any router nesting stripped a prefix.
pub(crate) fn request_path(req: &Request) -> String {
    req.extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string())
}
