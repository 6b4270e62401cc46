use std::sync::Arc;

use async_trait::async_trait;

use warden_auth::{AssuranceLevel, AuthenticatedUser};
use warden_core::{AuthResult, KeyedCache, TenantId};

use crate::client::IdentityClient;
use crate::credential::SessionCredential;
use crate::registry::ProviderKind;
use crate::tenant::TenantManager;

/// Tenant-scoped identity clients, built lazily and kept until the tenant is
/// deleted.
pub type TenantClientCache = KeyedCache<TenantId, Arc<dyn IdentityClient>>;

/// The active identity backend as seen by middleware and services.
///
/// Exactly one provider is built at start-up; every request goes through it.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Root-pool client.
    fn client(&self) -> Arc<dyn IdentityClient>;

    /// Client for one tenant's users.
    ///
    /// Backends without first-class tenants return the root client.
    fn client_for(&self, tenant_id: &TenantId) -> AuthResult<Arc<dyn IdentityClient>>;

    fn tenant_manager(&self) -> Arc<dyn TenantManager>;

    async fn verify_token(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser>;

    /// Verify a raw token that must belong to `tenant_id`.
    ///
    /// Tokens minted for another tenant fail with
    /// `Unauthenticated(TenantMismatch)`.
    async fn verify_token_with_tenant(&self, tenant_id: &TenantId, raw_token: &str) -> AuthResult<AuthenticatedUser>;

    fn supports_step_up(&self) -> bool;

    async fn assurance_level(&self, credential: &SessionCredential) -> AuthResult<Option<AssuranceLevel>> {
        self.client().assurance_level(credential).await
    }

    /// Drop any cached per-tenant state.
    fn evict_tenant(&self, tenant_id: &TenantId);
}
