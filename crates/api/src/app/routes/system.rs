use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::context::{PrincipalContext, TenantContext};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// GET /api/v1/me - The verified identity and the tenant scope it was
/// admitted into.
pub async fn whoami(
    Extension(principal): Extension<PrincipalContext>,
    tenant: Option<Extension<TenantContext>>,
) -> impl IntoResponse {
    let tenant = tenant.map(|Extension(t)| {
        serde_json::json!({
            "tenant_id": t.tenant_id(),
            "access": t.access(),
        })
    });
    Json(serde_json::json!({
        "identity": principal.identity(),
        "tenant": tenant,
    }))
}
