use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Uri},
    middleware::Next,
    response::Response,
};

use warden_auth::{
    Identity, RouteClass, ServicePrincipal, check_route, check_step_up, is_mutating_method, step_up_applies,
};
use warden_core::{AuthError, AuthResult, UnauthenticatedReason};
use warden_identity::SessionCredential;

use crate::app::{errors, services::AppServices};
use crate::context::{PrincipalContext, TenantScope};

use super::credentials::{api_key, session_credential};
use super::request_path;

/// Authenticate the caller and enforce the route-class rules.
///
/// Runs after tenant resolution so role checks see the request's tenant.
pub async fn auth_middleware(
    State(services): State<Arc<AppServices>>,
    mut req: Request,
    next: Next,
) -> Response {
    let path = request_path(&req);
    let class = services.settings.route_prefixes.classify(&path);
    if class == RouteClass::Public {
        return next.run(req).await;
    }

    let method = req.method().as_str().to_string();
    let resolved_tenant = req
        .extensions()
        .get::<TenantScope>()
        .and_then(|scope| scope.tenant_id().cloned());

    let (identity, credential) = match authenticate(&services, req.headers(), req.uri(), class, &method).await {
        Ok(found) => found,
        Err(err) => {
            tracing::info!(path = %path, code = err.code(), "authentication failed");
            return errors::auth_error_to_response(err);
        }
    };

    if let Err(err) = check_route(&identity, class, &method, resolved_tenant.as_ref()) {
        tracing::info!(
            user_id = %identity.user_id(),
            path = %path,
            method = %method,
            class = ?class,
            "route check denied"
        );
        return errors::auth_error_to_response(err);
    }

    if let Some(credential) = &credential {
        if services.provider.supports_step_up() && step_up_applies(&identity, class, &method) {
            if let Err(err) = require_assurance(&services, credential).await {
                tracing::info!(user_id = %identity.user_id(), path = %path, code = err.code(), "step-up check failed");
                return errors::auth_error_to_response(err);
            }
        }
    }

    req.extensions_mut().insert(PrincipalContext::new(identity));
    next.run(req).await
}

/// Service key first (never on privileged classes), then the session.
async fn authenticate(
    services: &AppServices,
    headers: &HeaderMap,
    uri: &Uri,
    class: RouteClass,
    method: &str,
) -> AuthResult<(Identity, Option<SessionCredential>)> {
    if let Some(key) = api_key(headers) {
        if !class.is_privileged() {
            let token = services.api_tokens.verify(key).await?;
            let principal = ServicePrincipal {
                user_id: token.created_by,
                token_id: token.id,
                scopes: token.scopes,
            };
            return Ok((Identity::Service(principal), None));
        }
        tracing::debug!(class = ?class, "service key ignored on privileged route");
    }

    let credential = session_credential(headers, uri, &services.settings.session_cookie)
        .ok_or(AuthError::unauthenticated(UnauthenticatedReason::MissingCredential))?;
    let user = services
        .provider
        .verify_token(&credential)
        .await
        .map_err(|err| session_error(err, class, method))?;
    Ok((Identity::User(user), Some(credential)))
}

/// A backend that refuses the session for want of a second factor only
/// surfaces as a step-up prompt where step-up is enforced; elsewhere the
/// session simply did not verify.
fn session_error(err: AuthError, class: RouteClass, method: &str) -> AuthError {
    match err {
        AuthError::StepUpRequired if !(class.is_privileged() && is_mutating_method(method)) => {
            AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential)
        }
        other => other,
    }
}

async fn require_assurance(services: &AppServices, credential: &SessionCredential) -> AuthResult<()> {
    match services.provider.assurance_level(credential).await? {
        Some(level) => check_step_up(&level),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_step_up_demand_is_unauthenticated_outside_step_up_scope() {
        for (class, method) in [
            (RouteClass::Authenticated, "GET"),
            (RouteClass::Authenticated, "POST"),
            (RouteClass::Admin, "GET"),
        ] {
            let err = session_error(AuthError::StepUpRequired, class, method);
            assert_eq!(err.code(), "unauthenticated");
        }
    }

    #[test]
    fn backend_step_up_demand_is_kept_on_privileged_mutations() {
        let err = session_error(AuthError::StepUpRequired, RouteClass::UserManagement, "POST");
        assert_eq!(err, AuthError::StepUpRequired);
    }

    #[test]
    fn other_verify_errors_pass_through() {
        let err = session_error(AuthError::backend("down"), RouteClass::Authenticated, "GET");
        assert_eq!(err.code(), "backend_unavailable");
    }
}
