use axum::{Router, routing::get};

use warden_auth::{Identity, RoutePrefixes};
use warden_core::{AuthError, TenantId};

use crate::app::errors;
use crate::context::TenantContext;

pub mod admin;
pub mod public;
pub mod superadmin;
pub mod system;
pub mod users;

/// Router for every endpoint behind the middleware chain.
///
/// Route-class subtrees are mounted at the configured prefixes so the path a
/// handler is reachable under always matches the class it is checked against.
pub fn router(prefixes: &RoutePrefixes) -> Router {
    let router = Router::new().route("/api/v1/me", get(system::whoami));
    let router = mount(router, &prefixes.public, public::router());
    let router = mount(router, &prefixes.user_management, users::router());
    let router = mount(router, &prefixes.admin, admin::router());
    mount(router, &prefixes.superadmin, superadmin::router())
}

fn mount(router: Router, prefix: &str, sub: Router) -> Router {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        router.merge(sub)
    } else {
        router.nest(prefix, sub)
    }
}

/// Tenant a tenant-scoped handler acts on: the request's tenant, or on the
/// root domain the caller's session tenant.
pub(crate) fn acting_tenant(
    tenant: Option<&TenantContext>,
    identity: &Identity,
) -> Result<TenantId, axum::response::Response> {
    tenant
        .map(|t| t.tenant_id().clone())
        .or_else(|| identity.session_tenant_id().cloned())
        .ok_or_else(|| {
            errors::auth_error_to_response(AuthError::invalid(
                "no tenant scope; call this endpoint on a tenant subdomain",
            ))
        })
}
