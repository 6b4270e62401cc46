//! Unauthenticated endpoints. Nothing here may depend on a caller identity.

use std::sync::Arc;

use axum::{
    extract::Extension,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use warden_core::AuthError;

use crate::app::{errors, services::AppServices};
use crate::context::TenantScope;

pub fn router() -> Router {
    Router::new().route("/tenant", get(current_tenant))
}

/// GET {public}/tenant - Sign-in settings for the tenant named by the host,
/// used by login pages before any session exists.
pub async fn current_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    scope: Option<Extension<TenantScope>>,
) -> axum::response::Response {
    let Some(tenant_id) = scope.as_ref().and_then(|Extension(s)| s.tenant_id()) else {
        return errors::auth_error_to_response(AuthError::TenantNotFound);
    };

    match services.tenants.get(tenant_id).await {
        Ok(tenant) => Json(json!({
            "tenant_id": tenant.tenant_id,
            "subdomain": tenant.subdomain,
            "display_name": tenant.display_name,
            "sign_in_options": tenant.sign_in_options,
            "identity_provider": services.provider.kind().as_str(),
        }))
        .into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
