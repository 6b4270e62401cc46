use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use warden_core::{AuthError, AuthResult, TenantId};

/// Per-tenant sign-in settings mirrored into backends that support them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInOptions {
    pub allow_password_sign_up: bool,
    pub enable_email_link_sign_in: bool,
}

impl Default for SignInOptions {
    fn default() -> Self {
        Self {
            allow_password_sign_up: true,
            enable_email_link_sign_in: false,
        }
    }
}

/// A tenant. `subdomain` is unique and is the only external lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub subdomain: String,
    pub display_name: String,
    #[serde(default)]
    pub sign_in_options: SignInOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewTenant {
    pub subdomain: String,
    pub display_name: String,
    #[serde(default)]
    pub sign_in_options: SignInOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TenantUpdate {
    #[serde(default)]
    pub subdomain: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub sign_in_options: Option<SignInOptions>,
}

impl TenantUpdate {
    /// Apply to `tenant`, validating any new subdomain.
    pub fn apply(&self, tenant: &Tenant) -> AuthResult<Tenant> {
        let mut next = tenant.clone();
        if let Some(s) = &self.subdomain {
            next.subdomain = normalize_subdomain(s)?;
        }
        if let Some(name) = &self.display_name {
            next.display_name = validate_display_name(name)?;
        }
        if let Some(opts) = self.sign_in_options {
            next.sign_in_options = opts;
        }
        Ok(next)
    }
}

/// Lowercase and validate a DNS label used as a tenant subdomain.
pub fn normalize_subdomain(raw: &str) -> AuthResult<String> {
    let s = raw.trim().to_ascii_lowercase();
    if s.is_empty() || s.len() > 63 {
        return Err(AuthError::invalid("subdomain must be 1-63 characters"));
    }
    if s.starts_with('-') || s.ends_with('-') {
        return Err(AuthError::invalid("subdomain must not start or end with '-'"));
    }
    if !s.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-') {
        return Err(AuthError::invalid("subdomain may contain only a-z, 0-9 and '-'"));
    }
    Ok(s)
}

pub(crate) fn validate_display_name(raw: &str) -> AuthResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AuthError::invalid("display_name must not be empty"));
    }
    Ok(name.to_string())
}

/// Tenant lifecycle as exposed by the active identity provider.
#[async_trait]
pub trait TenantManager: Send + Sync {
    async fn create_tenant(&self, new: NewTenant) -> AuthResult<Tenant>;

    async fn update_tenant(&self, tenant_id: &TenantId, update: TenantUpdate) -> AuthResult<Tenant>;

    async fn delete_tenant(&self, tenant_id: &TenantId) -> AuthResult<()>;

    async fn get_tenant(&self, tenant_id: &TenantId) -> AuthResult<Tenant>;

    async fn list_tenants(&self) -> AuthResult<Vec<Tenant>>;
}

/// Relational tenant rows (`tenants` table).
///
/// Implementations must enforce subdomain uniqueness and report a clash as
/// [`AuthError::AlreadyExists`].
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn insert(&self, tenant: &Tenant) -> AuthResult<()>;

    /// Fails with [`AuthError::TenantNotFound`] if the row is missing.
    async fn update(&self, tenant: &Tenant) -> AuthResult<()>;

    /// Fails with [`AuthError::TenantNotFound`] if the row is missing.
    async fn delete(&self, tenant_id: &TenantId) -> AuthResult<()>;

    async fn get(&self, tenant_id: &TenantId) -> AuthResult<Option<Tenant>>;

    async fn find_by_subdomain(&self, subdomain: &str) -> AuthResult<Option<Tenant>>;

    async fn list(&self) -> AuthResult<Vec<Tenant>>;
}
