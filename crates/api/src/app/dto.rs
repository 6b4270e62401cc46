use std::collections::BTreeSet;

use serde::Deserialize;

use warden_auth::TenantRole;
use warden_core::{TenantId, UserId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub user_id: String,
    pub roles: BTreeSet<TenantRole>,
}

#[derive(Debug, Deserialize)]
pub struct SetRolesRequest {
    pub roles: BTreeSet<TenantRole>,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterApplicationRequest {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RevokeTokenRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -------------------------
// Path parsing
// -------------------------

pub fn parse_user_id(raw: String) -> Result<UserId, axum::response::Response> {
    UserId::new(raw).map_err(errors::auth_error_to_response)
}

pub fn parse_tenant_id(raw: String) -> Result<TenantId, axum::response::Response> {
    TenantId::new(raw).map_err(errors::auth_error_to_response)
}
