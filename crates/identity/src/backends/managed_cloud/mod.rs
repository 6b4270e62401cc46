//! Managed-cloud backend: tenants are first-class objects in the identity
//! service, each with its own user pool.

mod api;
mod client;
mod tenants;

use std::sync::Arc;

use async_trait::async_trait;

use warden_auth::AuthenticatedUser;
use warden_core::{AuthError, AuthResult, TenantId};

pub use client::ManagedCloudClient;
pub use tenants::ManagedCloudTenantManager;

use api::CloudApi;

use crate::client::IdentityClient;
use crate::config::ProviderConfig;
use crate::credential::SessionCredential;
use crate::provider::{IdentityProvider, TenantClientCache};
use crate::registry::{ProviderDeps, ProviderKind};
use crate::tenant::TenantManager;

pub struct ManagedCloudProvider {
    api: Arc<CloudApi>,
    root: Arc<dyn IdentityClient>,
    clients: Arc<TenantClientCache>,
    tenants: Arc<ManagedCloudTenantManager>,
}

impl ManagedCloudProvider {
    pub fn new(config: &ProviderConfig, deps: ProviderDeps) -> AuthResult<Self> {
        let section = config
            .managed_cloud
            .as_ref()
            .ok_or_else(|| AuthError::invalid("managed cloud provider selected without its configuration"))?;
        let api = Arc::new(CloudApi::new(section, config.backend_timeout)?);
        Ok(Self {
            root: Arc::new(ManagedCloudClient::root(api.clone())),
            tenants: Arc::new(ManagedCloudTenantManager::new(
                api.clone(),
                deps.directory,
                deps.client_cache.clone(),
            )),
            clients: deps.client_cache,
            api,
        })
    }
}

pub(crate) fn build_provider(config: &ProviderConfig, deps: ProviderDeps) -> AuthResult<Arc<dyn IdentityProvider>> {
    Ok(Arc::new(ManagedCloudProvider::new(config, deps)?))
}

#[async_trait]
impl IdentityProvider for ManagedCloudProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::managed_cloud()
    }

    fn client(&self) -> Arc<dyn IdentityClient> {
        self.root.clone()
    }

    fn client_for(&self, tenant_id: &TenantId) -> AuthResult<Arc<dyn IdentityClient>> {
        self.clients.get_or_try_insert_with(tenant_id.clone(), || {
            tracing::debug!(tenant_id = %tenant_id, "building tenant identity client");
            Ok(Arc::new(ManagedCloudClient::for_tenant(self.api.clone(), tenant_id.clone())) as Arc<dyn IdentityClient>)
        })
    }

    fn tenant_manager(&self) -> Arc<dyn TenantManager> {
        self.tenants.clone()
    }

    async fn verify_token(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        self.root.verify_session(credential).await
    }

    async fn verify_token_with_tenant(&self, tenant_id: &TenantId, raw_token: &str) -> AuthResult<AuthenticatedUser> {
        self.client_for(tenant_id)?
            .verify_session(&SessionCredential::bearer(raw_token))
            .await
    }

    fn supports_step_up(&self) -> bool {
        false
    }

    fn evict_tenant(&self, tenant_id: &TenantId) {
        if self.clients.invalidate(tenant_id).is_some() {
            tracing::debug!(tenant_id = %tenant_id, "evicted tenant identity client");
        }
    }
}
