//! Tenant administration: membership management in the acting tenant.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::json;

use crate::app::dto::{parse_user_id, MembershipRequest, SetRolesRequest};
use crate::app::routes::acting_tenant;
use crate::app::{errors, services::AppServices};
use crate::context::{PrincipalContext, TenantContext};

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/memberships", get(list_memberships).post(grant_membership))
        .route("/memberships/:user_id", delete(revoke_membership))
        .route("/memberships/:user_id/roles", put(set_roles))
        .route("/memberships/:user_id/suspend", post(suspend_membership))
        .route("/memberships/:user_id/activate", post(activate_membership))
        .route("/invitations", post(invite_member))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin-api/memberships - All memberships of the acting tenant.
pub async fn list_memberships(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.memberships.list_for_tenant(&tenant_id).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /admin-api/memberships - Grant roles (activates the membership).
pub async fn grant_membership(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Json(body): Json<MembershipRequest>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(body.user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services
        .memberships
        .grant(&tenant_id, &user_id, body.roles, principal.user_id())
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /admin-api/invitations - Record a pending membership.
pub async fn invite_member(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Json(body): Json<MembershipRequest>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(body.user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services
        .memberships
        .invite(&tenant_id, &user_id, body.roles, principal.user_id())
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// PUT /admin-api/memberships/:user_id/roles - Replace the role set.
pub async fn set_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Path(user_id): Path<String>,
    Json(body): Json<SetRolesRequest>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services.memberships.set_roles(&tenant_id, &user_id, body.roles).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /admin-api/memberships/:user_id/suspend
pub async fn suspend_membership(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if &user_id == principal.user_id() {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", "cannot suspend your own membership");
    }
    match services.memberships.suspend(&tenant_id, &user_id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /admin-api/memberships/:user_id/activate
pub async fn activate_membership(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services.memberships.activate(&tenant_id, &user_id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// DELETE /admin-api/memberships/:user_id
pub async fn revoke_membership(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services.memberships.revoke(&tenant_id, &user_id).await {
        Ok(revoked) => Json(json!({ "revoked": revoked })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
