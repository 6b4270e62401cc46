use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use warden_auth::{
    Identity, RouteClass, TenantAccess, TenantPrecheck, decide_tenant_access, precheck_tenant_access,
};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason};

use crate::app::{errors, services::AppServices};
use crate::context::{PrincipalContext, TenantContext, TenantScope};

use super::request_path;

/// Admit the caller into the resolved tenant and attach [`TenantContext`].
///
/// Order: global bypass, session claims, membership store, legacy claim.
pub async fn tenant_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = request_path(&req);
    if services.settings.route_prefixes.classify(&path) == RouteClass::Public {
        return next.run(req).await;
    }

    let Some(tenant_id) = req
        .extensions()
        .get::<TenantScope>()
        .and_then(|scope| scope.tenant_id().cloned())
    else {
        // Root domain: no tenant scope to enforce.
        return next.run(req).await;
    };

    let Some(principal) = req.extensions().get::<PrincipalContext>().cloned() else {
        return errors::auth_error_to_response(AuthError::unauthenticated(UnauthenticatedReason::MissingCredential));
    };
    let identity = principal.identity();

    let access = match admit(&services, identity, &tenant_id).await {
        Ok(access) => access,
        Err(err) => {
            tracing::info!(
                user_id = %identity.user_id(),
                tenant_id = %tenant_id,
                path = %path,
                "tenant access denied"
            );
            return errors::auth_error_to_response(err);
        }
    };

    if access == TenantAccess::Bypass {
        tracing::info!(
            target: "audit",
            user_id = %identity.user_id(),
            tenant_id = %tenant_id,
            method = %req.method(),
            path = %path,
            "privileged cross-tenant access"
        );
    }

    req.extensions_mut().insert(TenantContext::new(tenant_id, access));
    next.run(req).await
}

async fn admit(services: &AppServices, identity: &Identity, tenant_id: &TenantId) -> AuthResult<TenantAccess> {
    match precheck_tenant_access(identity, tenant_id) {
        TenantPrecheck::Granted(access) => Ok(access),
        TenantPrecheck::NeedsStoreLookup => {
            let in_store = services
                .memberships
                .has_active_membership(identity.user_id(), tenant_id)
                .await?;
            decide_tenant_access(identity, tenant_id, in_store)
        }
    }
}
