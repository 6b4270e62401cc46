//! User management within the acting tenant.
//!
//! Reads are open to any member; writes need CUSTOMER_ADMIN or above and a
//! fresh second factor on backends that support step-up.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use warden_auth::TenantRole;
use warden_core::TenantId;
use warden_identity::{IdentityClient, NewUser};

use crate::app::dto::{parse_user_id, EmailRequest};
use crate::app::routes::acting_tenant;
use crate::app::{errors, services::AppServices};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:user_id", get(get_user))
        .route("/password-reset", post(password_reset_link))
        .route("/email-verification", post(email_verification_link))
}

fn client_for(services: &AppServices, tenant_id: &TenantId) -> Result<Arc<dyn IdentityClient>, axum::response::Response> {
    services.provider.client_for(tenant_id).map_err(errors::auth_error_to_response)
}

/// GET {users} - Members of the acting tenant.
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    match services.memberships.list_for_tenant(&tenant_id).await {
        Ok(members) => Json(members).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST {users} - Create a user in the tenant's pool and make them a member
/// with the USER role.
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Json(body): Json<NewUser>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let client = match client_for(&services, &tenant_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let user = match client.create_user(body).await {
        Ok(u) => u,
        Err(e) => return errors::auth_error_to_response(e),
    };
    tracing::info!(
        target: "audit",
        tenant_id = %tenant_id,
        user_id = %user.user_id,
        created_by = %principal.user_id(),
        "user created"
    );

    match services
        .memberships
        .grant(&tenant_id, &user.user_id, BTreeSet::from([TenantRole::User]), principal.user_id())
        .await
    {
        Ok(membership) => (
            StatusCode::CREATED,
            Json(json!({ "user": user, "membership": membership })),
        )
            .into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// GET {users}/:user_id - A member of the acting tenant.
pub async fn get_user(
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

    // Non-members are reported as unknown users.
    let membership = match services.memberships.store().get(&user_id, &tenant_id).await {
        Ok(Some(m)) => m,
        Ok(None) => return errors::auth_error_to_response(warden_core::AuthError::UserNotFound),
        Err(e) => return errors::auth_error_to_response(e),
    };
    let client = match client_for(&services, &tenant_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match client.get_user(&user_id).await {
        Ok(user) => Json(json!({ "user": user, "membership": membership })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST {users}/password-reset - Password reset link for a tenant user.
pub async fn password_reset_link(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Json(body): Json<EmailRequest>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let client = match client_for(&services, &tenant_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match client.password_reset_link(body.email.trim()).await {
        Ok(link) => Json(json!({ "link": link })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}

/// POST {users}/email-verification - Email verification link for a tenant user.
pub async fn email_verification_link(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
    Json(body): Json<EmailRequest>,
) -> axum::response::Response {
    let tenant_id = match acting_tenant(tenant.as_deref(), principal.identity()) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let client = match client_for(&services, &tenant_id) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    match client.email_verification_link(body.email.trim()).await {
        Ok(link) => Json(json!({ "link": link })).into_response(),
        Err(e) => errors::auth_error_to_response(e),
    }
}
