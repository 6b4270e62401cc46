use warden_auth::{Identity, TenantAccess};
use warden_core::TenantId;

/// Tenant scope derived from the request host.
///
/// Inserted for every request that reaches the protected router. `tenant_id`
/// is `None` on the root domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    subdomain: Option<String>,
    tenant_id: Option<TenantId>,
}

impl TenantScope {
    pub fn new(subdomain: Option<String>, tenant_id: Option<TenantId>) -> Self {
        Self { subdomain, tenant_id }
    }

    pub fn root() -> Self {
        Self::new(None, None)
    }

    pub fn subdomain(&self) -> Option<&str> {
        self.subdomain.as_deref()
    }

    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// Tenant context for a request that passed the membership check.
///
/// Only present on tenant subdomains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
    access: TenantAccess,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId, access: TenantAccess) -> Self {
        Self { tenant_id, access }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// How membership was established.
    pub fn access(&self) -> TenantAccess {
        self.access
    }
}

/// Principal context for a request (the verified identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    identity: Identity,
}

impl PrincipalContext {
    pub fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn user_id(&self) -> &warden_core::UserId {
        self.identity.user_id()
    }
}
