use std::sync::Arc;

use async_trait::async_trait;

use warden_core::{AuthError, AuthResult, TenantId};

use super::api::CloudApi;
use crate::provider::TenantClientCache;
use crate::tenant::{NewTenant, SignInOptions, Tenant, TenantDirectory, TenantManager, TenantUpdate, normalize_subdomain, validate_display_name};

/// Tenants exist in the backend and in the relational directory.
///
/// The backend is written first; a failed directory write triggers a
/// compensating backend delete so the two never diverge on create.
pub struct ManagedCloudTenantManager {
    api: Arc<CloudApi>,
    directory: Arc<dyn TenantDirectory>,
    clients: Arc<TenantClientCache>,
}

impl ManagedCloudTenantManager {
    pub(crate) fn new(api: Arc<CloudApi>, directory: Arc<dyn TenantDirectory>, clients: Arc<TenantClientCache>) -> Self {
        Self { api, directory, clients }
    }
}

#[async_trait]
impl TenantManager for ManagedCloudTenantManager {
    async fn create_tenant(&self, new: NewTenant) -> AuthResult<Tenant> {
        let subdomain = normalize_subdomain(&new.subdomain)?;
        let display_name = validate_display_name(&new.display_name)?;
        if self.directory.find_by_subdomain(&subdomain).await?.is_some() {
            return Err(AuthError::already_exists(format!("subdomain '{subdomain}' is taken")));
        }

        let created = self.api.create_tenant(&display_name, new.sign_in_options).await?;
        let tenant_id = created.tenant_id()?;
        let tenant = Tenant {
            tenant_id: tenant_id.clone(),
            subdomain,
            display_name: created.display_name.clone().unwrap_or(display_name),
            sign_in_options: SignInOptions {
                allow_password_sign_up: created.allow_password_signup,
                enable_email_link_sign_in: created.enable_email_link_signin,
            },
        };

        if let Err(e) = self.directory.insert(&tenant).await {
            tracing::warn!(tenant_id = %tenant_id, error = %e, "directory insert failed; deleting backend tenant");
            if let Err(cleanup) = self.api.delete_tenant(&tenant_id).await {
                tracing::error!(tenant_id = %tenant_id, error = %cleanup, "compensating backend delete failed");
            }
            return Err(e);
        }

        tracing::info!(tenant_id = %tenant.tenant_id, subdomain = %tenant.subdomain, "tenant created");
        Ok(tenant)
    }

    async fn update_tenant(&self, tenant_id: &TenantId, update: TenantUpdate) -> AuthResult<Tenant> {
        let current = self.get_tenant(tenant_id).await?;
        let next = update.apply(&current)?;
        if next == current {
            return Ok(current);
        }
        if next.subdomain != current.subdomain {
            if let Some(other) = self.directory.find_by_subdomain(&next.subdomain).await? {
                if &other.tenant_id != tenant_id {
                    return Err(AuthError::already_exists(format!("subdomain '{}' is taken", next.subdomain)));
                }
            }
        }
        if next.display_name != current.display_name || next.sign_in_options != current.sign_in_options {
            self.api
                .update_tenant(tenant_id, &next.display_name, next.sign_in_options)
                .await?;
        }
        self.directory.update(&next).await?;
        tracing::info!(tenant_id = %tenant_id, "tenant updated");
        Ok(next)
    }

    async fn delete_tenant(&self, tenant_id: &TenantId) -> AuthResult<()> {
        self.get_tenant(tenant_id).await?;
        match self.api.delete_tenant(tenant_id).await {
            Ok(()) | Err(AuthError::TenantNotFound) => {}
            Err(e) => return Err(e),
        }
        self.directory.delete(tenant_id).await?;
        self.clients.invalidate(tenant_id);
        tracing::info!(tenant_id = %tenant_id, "tenant deleted");
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: &TenantId) -> AuthResult<Tenant> {
        self.directory.get(tenant_id).await?.ok_or(AuthError::TenantNotFound)
    }

    async fn list_tenants(&self) -> AuthResult<Vec<Tenant>> {
        self.directory.list().await
    }
}
