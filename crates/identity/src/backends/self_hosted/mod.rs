//! Self-hosted backend: one identity pool, tenancy kept in the relational
//! directory, step-up via authenticator assurance levels.

mod api;
mod client;
mod tenants;

use std::sync::Arc;

use async_trait::async_trait;

use warden_auth::{AuthenticatedUser, Identity, decide_tenant_access};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason};

pub use client::SelfHostedClient;
pub use tenants::DirectoryTenantManager;

use api::SelfHostedApi;

use crate::client::IdentityClient;
use crate::config::ProviderConfig;
use crate::credential::SessionCredential;
use crate::provider::IdentityProvider;
use crate::registry::{ProviderDeps, ProviderKind};
use crate::tenant::TenantManager;

pub struct SelfHostedProvider {
    client: Arc<dyn IdentityClient>,
    tenants: Arc<DirectoryTenantManager>,
}

impl SelfHostedProvider {
    pub fn new(config: &ProviderConfig, deps: ProviderDeps) -> AuthResult<Self> {
        let section = config
            .self_hosted
            .as_ref()
            .ok_or_else(|| AuthError::invalid("self-hosted provider selected without its configuration"))?;
        let api = Arc::new(SelfHostedApi::new(section, config.backend_timeout)?);
        Ok(Self {
            client: Arc::new(SelfHostedClient::new(api)),
            tenants: Arc::new(DirectoryTenantManager::new(deps.directory)),
        })
    }
}

pub(crate) fn build_provider(config: &ProviderConfig, deps: ProviderDeps) -> AuthResult<Arc<dyn IdentityProvider>> {
    Ok(Arc::new(SelfHostedProvider::new(config, deps)?))
}

#[async_trait]
impl IdentityProvider for SelfHostedProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::self_hosted()
    }

    fn client(&self) -> Arc<dyn IdentityClient> {
        self.client.clone()
    }

    fn client_for(&self, _tenant_id: &TenantId) -> AuthResult<Arc<dyn IdentityClient>> {
        Ok(self.client.clone())
    }

    fn tenant_manager(&self) -> Arc<dyn TenantManager> {
        self.tenants.clone()
    }

    async fn verify_token(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        self.client.verify_session(credential).await
    }

    /// Sessions are not minted per tenant here, so "belongs to the tenant"
    /// means the session's claims associate the user with it.
    async fn verify_token_with_tenant(&self, tenant_id: &TenantId, raw_token: &str) -> AuthResult<AuthenticatedUser> {
        let user = self.client.verify_session(&SessionCredential::bearer(raw_token)).await?;
        if decide_tenant_access(&Identity::User(user.clone()), tenant_id, false).is_err() {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::TenantMismatch));
        }
        Ok(user)
    }

    fn supports_step_up(&self) -> bool {
        true
    }

    fn evict_tenant(&self, _tenant_id: &TenantId) {}
}
