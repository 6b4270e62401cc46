//! Platform administration: tenants, cross-tenant memberships, client
//! applications and their API tokens.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use warden_core::{ClientApplicationId, TokenId};
use warden_identity::{NewTenant, TenantUpdate};
use warden_infra::api_tokens::IssueTokenRequest;

use crate::app::dto::{parse_tenant_id, parse_user_id, MembershipRequest, RegisterApplicationRequest, RevokeTokenRequest};
use crate::app::{errors, services::AppServices};
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/tenants/:tenant_id",
            get(get_tenant).patch(update_tenant).delete(delete_tenant),
        )
        .route(
            "/tenants/:tenant_id/memberships",
            get(list_tenant_memberships).post(grant_tenant_membership),
        )
        .route("/users/:user_id/memberships", get(list_user_memberships))
        .route("/users/:user_id/claims/sync", post(sync_user_claims))
        .route("/applications", get(list_applications).post(register_application))
        .route("/applications/:app_id/tokens", get(list_tokens).post(issue_token))
        .route("/tokens/:token_id", get(get_token))
        .route("/tokens/:token_id/revoke", post(revoke_token))
        .route("/tokens/:token_id/audit", get(token_audit_log))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenants
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_tenants(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.tenants.list().await {
        Ok(tenants) => Json(tenants).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn create_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewTenant>,
) -> axum::response::Response {
    match services.tenants.create(body).await {
        Ok(tenant) => {
            tracing::info!(
                target: "audit",
                tenant_id = %tenant.tenant_id,
                subdomain = %tenant.subdomain,
                created_by = %principal.user_id(),
                "tenant created"
            );
            (StatusCode::CREATED, Json(tenant)).into_response()
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn get_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match parse_tenant_id(tenant_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.tenants.get(&tenant_id).await {
        Ok(tenant) => Json(tenant).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn update_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
    Json(body): Json<TenantUpdate>,
) -> axum::response::Response {
    let tenant_id = match parse_tenant_id(tenant_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.tenants.update(&tenant_id, body).await {
        Ok(tenant) => Json(tenant).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn delete_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(tenant_id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match parse_tenant_id(tenant_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.tenants.delete(&tenant_id).await {
        Ok(()) => {
            tracing::info!(target: "audit", tenant_id = %tenant_id, deleted_by = %principal.user_id(), "tenant deleted");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::auth_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memberships across tenants
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_tenant_memberships(
    Extension(services): Extension<Arc<AppServices>>,
    Path(tenant_id): Path<String>,
) -> axum::response::Response {
    let tenant_id = match parse_tenant_id(tenant_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.memberships.list_for_tenant(&tenant_id).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn grant_tenant_membership(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(tenant_id): Path<String>,
    Json(body): Json<MembershipRequest>,
) -> axum::response::Response {
    let tenant_id = match parse_tenant_id(tenant_id) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let user_id = match parse_user_id(body.user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    // Unknown tenants would otherwise surface as a store constraint error.
    if let Err(e) = services.tenants.get(&tenant_id).await {
        return errors::auth_error_to_response(e);
    }
    match services
        .memberships
        .grant(&tenant_id, &user_id, body.roles, principal.user_id())
        .await
    {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn list_user_memberships(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services.memberships.list_for_user(&user_id).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /superadmin-api/users/:user_id/claims/sync - Retry the backend claim
/// sync after a `backend_unavailable` failure.
pub async fn sync_user_claims(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id = match parse_user_id(user_id) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match services.memberships.sync_claims(&user_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client applications and API tokens
// ─────────────────────────────────────────────────────────────────────────────

pub async fn list_applications(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.api_tokens.list_applications().await {
        Ok(apps) => Json(apps).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn register_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<RegisterApplicationRequest>,
) -> axum::response::Response {
    match services
        .api_tokens
        .register_application(&body.name, principal.user_id())
        .await
    {
        Ok(app) => (StatusCode::CREATED, Json(app)).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn list_tokens(
    Extension(services): Extension<Arc<AppServices>>,
    Path(app_id): Path<Uuid>,
) -> axum::response::Response {
    match services
        .api_tokens
        .list_for_application(ClientApplicationId::from_uuid(app_id))
        .await
    {
        Ok(tokens) => Json(tokens).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST /superadmin-api/applications/:app_id/tokens - Mint a token. The
/// plaintext is in this response only.
pub async fn issue_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(app_id): Path<Uuid>,
    Json(body): Json<IssueTokenRequest>,
) -> axum::response::Response {
    match services
        .api_tokens
        .issue(ClientApplicationId::from_uuid(app_id), body, principal.user_id())
        .await
    {
        Ok(issued) => (
            StatusCode::CREATED,
            Json(json!({
                "token": issued.plaintext,
                "api_token": issued.token,
            })),
        )
            .into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn get_token(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token_id): Path<Uuid>,
) -> axum::response::Response {
    match services.api_tokens.get(TokenId::from_uuid(token_id)).await {
        Ok(token) => Json(token).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn revoke_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(token_id): Path<Uuid>,
    body: Option<Json<RevokeTokenRequest>>,
) -> axum::response::Response {
    let reason = body.and_then(|Json(b)| b.reason).unwrap_or_default();
    match services
        .api_tokens
        .revoke(TokenId::from_uuid(token_id), &reason, principal.user_id())
        .await
    {
        Ok(token) => Json(token).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

pub async fn token_audit_log(
    Extension(services): Extension<Arc<AppServices>>,
    Path(token_id): Path<Uuid>,
) -> axum::response::Response {
    match services.api_tokens.audit_log(TokenId::from_uuid(token_id)).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
