use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use warden_auth::RouteClass;

use crate::app::{errors, services::AppServices};
use crate::context::TenantScope;

use super::credentials::{request_host, subdomain_of};
use super::request_path;

/// Map the request host to a tenant and attach a [`TenantScope`].
///
/// An unknown subdomain is a 404 everywhere except on public routes, which
/// continue with no tenant scope.
pub async fn resolve_tenant_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let subdomain = request_host(req.headers(), req.uri())
        .and_then(|host| subdomain_of(&host, &services.settings.base_domain));

    let scope = match services.resolver.resolve(subdomain.as_deref()).await {
        Ok(tenant_id) => TenantScope::new(subdomain, tenant_id),
        Err(err) => {
            let path = request_path(&req);
            if services.settings.route_prefixes.classify(&path) != RouteClass::Public {
                return errors::auth_error_to_response(err);
            }
            tracing::debug!(subdomain = ?subdomain, error = %err, "public route on unresolved subdomain");
            TenantScope::root()
        }
    };

    req.extensions_mut().insert(scope);
    next.run(req).await
}
