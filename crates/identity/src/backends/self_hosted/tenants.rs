use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use warden_core::{AuthError, AuthResult, TenantId};

use crate::tenant::{NewTenant, Tenant, TenantDirectory, TenantManager, TenantUpdate, normalize_subdomain, validate_display_name};

/// The self-hosted backend has a single pool; tenants exist only in the
/// relational directory and their ids are minted here.
pub struct DirectoryTenantManager {
    directory: Arc<dyn TenantDirectory>,
}

impl DirectoryTenantManager {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl TenantManager for DirectoryTenantManager {
    async fn create_tenant(&self, new: NewTenant) -> AuthResult<Tenant> {
        let tenant = Tenant {
            tenant_id: TenantId::new(Uuid::now_v7().to_string())?,
            subdomain: normalize_subdomain(&new.subdomain)?,
            display_name: validate_display_name(&new.display_name)?,
            sign_in_options: new.sign_in_options,
        };
        // The directory enforces subdomain uniqueness.
        self.directory.insert(&tenant).await?;
        tracing::info!(tenant_id = %tenant.tenant_id, subdomain = %tenant.subdomain, "tenant created");
        Ok(tenant)
    }

    async fn update_tenant(&self, tenant_id: &TenantId, update: TenantUpdate) -> AuthResult<Tenant> {
        let current = self.get_tenant(tenant_id).await?;
        let next = update.apply(&current)?;
        if next != current {
            self.directory.update(&next).await?;
            tracing::info!(tenant_id = %tenant_id, "tenant updated");
        }
        Ok(next)
    }

    async fn delete_tenant(&self, tenant_id: &TenantId) -> AuthResult<()> {
        self.directory.delete(tenant_id).await?;
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
