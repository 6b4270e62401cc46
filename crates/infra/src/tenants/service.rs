use std::sync::Arc;

use tracing::instrument;

use warden_core::{AuthResult, TenantId};
use warden_identity::{IdentityProvider, NewTenant, Tenant, TenantUpdate};

use crate::membership::MembershipService;

use super::resolver::TenantResolver;

/// Tenant lifecycle on top of the active provider's tenant manager.
///
/// Keeps the subdomain cache, the provider's per-tenant client cache and the
/// membership table consistent with tenant updates and deletions.
pub struct TenantService {
    provider: Arc<dyn IdentityProvider>,
    resolver: Arc<TenantResolver>,
    memberships: Arc<MembershipService>,
}

impl TenantService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        resolver: Arc<TenantResolver>,
        memberships: Arc<MembershipService>,
    ) -> Self {
        Self {
            provider,
            resolver,
            memberships,
        }
    }

    pub async fn create(&self, new: NewTenant) -> AuthResult<Tenant> {
        self.provider.tenant_manager().create_tenant(new).await
    }

    pub async fn get(&self, tenant_id: &TenantId) -> AuthResult<Tenant> {
        self.provider.tenant_manager().get_tenant(tenant_id).await
    }

    pub async fn list(&self) -> AuthResult<Vec<Tenant>> {
        self.provider.tenant_manager().list_tenants().await
    }

    #[instrument(skip(self, update), fields(tenant_id = %tenant_id), err)]
    pub async fn update(&self, tenant_id: &TenantId, update: TenantUpdate) -> AuthResult<Tenant> {
        let manager = self.provider.tenant_manager();
        let before = manager.get_tenant(tenant_id).await?;
        let after = manager.update_tenant(tenant_id, update).await?;
        if before.subdomain != after.subdomain {
            self.resolver.invalidate(&before.subdomain);
            tracing::info!(
                tenant_id = %tenant_id,
                from = %before.subdomain,
                to = %after.subdomain,
                "tenant subdomain changed"
            );
        }
        Ok(after)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub async fn delete(&self, tenant_id: &TenantId) -> AuthResult<()> {
        let manager = self.provider.tenant_manager();
        let tenant = manager.get_tenant(tenant_id).await?;
        // Captured first: the relational delete may cascade to memberships.
        let members = self.memberships.list_for_tenant(tenant_id).await?;

        manager.delete_tenant(tenant_id).await?;
        self.resolver.invalidate(&tenant.subdomain);
        self.resolver.invalidate_tenant(tenant_id);
        self.provider.evict_tenant(tenant_id);

        let purged = self.memberships.purge_tenant(tenant_id, members).await?;
        tracing::info!(tenant_id = %tenant_id, memberships = purged, "tenant removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use warden_auth::TenantRole;
    use warden_core::{AuthError, UserId};
    use warden_identity::SignInOptions;

    use crate::membership::InMemoryMembershipStore;
    use crate::test_support::FakeProvider;

    struct Fixture {
        provider: Arc<FakeProvider>,
        resolver: Arc<TenantResolver>,
        memberships: Arc<MembershipService>,
        tenants: TenantService,
    }

    fn fixture() -> Fixture {
        let provider = FakeProvider::with_users(&["u1"]);
        let resolver = Arc::new(TenantResolver::new(provider.directory(), ["www".to_string()]));
        let memberships = Arc::new(MembershipService::new(InMemoryMembershipStore::arc(), provider.clone()));
        let tenants = TenantService::new(provider.clone(), resolver.clone(), memberships.clone());
        Fixture {
            provider,
            resolver,
            memberships,
            tenants,
        }
    }

    fn acme() -> NewTenant {
        NewTenant {
            subdomain: "acme".into(),
            display_name: "Acme".into(),
            sign_in_options: SignInOptions::default(),
        }
    }

    #[tokio::test]
    async fn subdomain_change_invalidates_cache() {
        let f = fixture();
        let tenant = f.tenants.create(acme()).await.unwrap();
        assert_eq!(f.resolver.resolve(Some("acme")).await.unwrap(), Some(tenant.tenant_id.clone()));

        f.tenants
            .update(
                &tenant.tenant_id,
                TenantUpdate {
                    subdomain: Some("acme-corp".into()),
                    ..TenantUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(f.resolver.resolve(Some("acme")).await.unwrap_err(), AuthError::TenantNotFound);
        assert_eq!(
            f.resolver.resolve(Some("acme-corp")).await.unwrap(),
            Some(tenant.tenant_id)
        );
    }

    #[tokio::test]
    async fn delete_cleans_caches_and_memberships() {
        let f = fixture();
        let tenant = f.tenants.create(acme()).await.unwrap();
        let u1 = UserId::new("u1").unwrap();
        let roles: BTreeSet<_> = [TenantRole::User].into_iter().collect();
        f.memberships
            .grant(&tenant.tenant_id, &u1, roles, &UserId::new("root").unwrap())
            .await
            .unwrap();
        f.resolver.resolve(Some("acme")).await.unwrap();

        f.tenants.delete(&tenant.tenant_id).await.unwrap();

        assert_eq!(f.resolver.cached_len(), 0);
        assert_eq!(f.provider.evicted(), vec![tenant.tenant_id.clone()]);
        assert!(f.memberships.list_for_user(&u1).await.unwrap().is_empty());
        assert!(f.provider.claims_of(&u1).tenant_memberships.is_empty());
        assert_eq!(f.tenants.get(&tenant.tenant_id).await.unwrap_err(), AuthError::TenantNotFound);
    }
}
