//! Subdomain → tenant resolution with a read-through cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::instrument;

use warden_core::{AuthError, AuthResult, KeyedCache, TenantId};
use warden_identity::TenantDirectory;

/// Maps a request's subdomain to the tenant it belongs to.
///
/// Entries are loaded on first use and stay until [`TenantResolver::invalidate`]
/// is called for that subdomain. The resolver is owned by the composition root;
/// there is no process-global instance.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    cache: KeyedCache<String, TenantId>,
    root_subdomains: BTreeSet<String>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>, root_subdomains: impl IntoIterator<Item = String>) -> Self {
        Self {
            directory,
            cache: KeyedCache::new(),
            root_subdomains: root_subdomains
                .into_iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Whether `subdomain` means "no tenant scope".
    pub fn is_root(&self, subdomain: Option<&str>) -> bool {
        match subdomain.map(str::trim) {
            None | Some("") => true,
            Some(s) => self.root_subdomains.contains(&s.to_ascii_lowercase()),
        }
    }

    /// Resolve `subdomain` to a tenant.
    ///
    /// Returns `Ok(None)` for the empty or a reserved root subdomain, and
    /// `TenantNotFound` when no tenant owns it.
    #[instrument(skip(self), err)]
    pub async fn resolve(&self, subdomain: Option<&str>) -> AuthResult<Option<TenantId>> {
        if self.is_root(subdomain) {
            return Ok(None);
        }
        let key = subdomain.unwrap_or_default().trim().to_ascii_lowercase();

        if let Some(tenant_id) = self.cache.get(&key) {
            return Ok(Some(tenant_id));
        }

        let tenant = self
            .directory
            .find_by_subdomain(&key)
            .await?
            .ok_or(AuthError::TenantNotFound)?;
        tracing::debug!(subdomain = %key, tenant_id = %tenant.tenant_id, "subdomain resolved from store");
        Ok(Some(self.cache.insert_if_absent(key, tenant.tenant_id)))
    }

    /// Drop the cached binding for `subdomain`.
    pub fn invalidate(&self, subdomain: &str) {
        let key = subdomain.trim().to_ascii_lowercase();
        if self.cache.invalidate(&key).is_some() {
            tracing::debug!(subdomain = %key, "subdomain binding evicted");
        }
    }

    /// Drop every cached binding that points at `tenant_id`.
    pub fn invalidate_tenant(&self, tenant_id: &TenantId) {
        self.cache.invalidate_where(|_, cached| cached == tenant_id);
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenants::InMemoryTenantDirectory;
    use warden_identity::{SignInOptions, Tenant};

    async fn resolver_with_acme() -> (Arc<InMemoryTenantDirectory>, TenantResolver) {
        let directory = InMemoryTenantDirectory::arc();
        directory
            .insert(&Tenant {
                tenant_id: TenantId::new("t1").unwrap(),
                subdomain: "acme".into(),
                display_name: "Acme".into(),
                sign_in_options: SignInOptions::default(),
            })
            .await
            .unwrap();
        let resolver = TenantResolver::new(directory.clone(), ["www".to_string()]);
        (directory, resolver)
    }

    #[tokio::test]
    async fn root_and_empty_have_no_tenant_scope() {
        let (_, resolver) = resolver_with_acme().await;
        assert_eq!(resolver.resolve(None).await.unwrap(), None);
        assert_eq!(resolver.resolve(Some("")).await.unwrap(), None);
        assert_eq!(resolver.resolve(Some("WWW")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn known_subdomain_resolves_and_is_cached() {
        let (directory, resolver) = resolver_with_acme().await;
        let t1 = TenantId::new("t1").unwrap();

        assert_eq!(resolver.resolve(Some("Acme")).await.unwrap(), Some(t1.clone()));
        assert_eq!(resolver.cached_len(), 1);

        // Served from cache even once the row is gone.
        directory.delete(&t1).await.unwrap();
        assert_eq!(resolver.resolve(Some("acme")).await.unwrap(), Some(t1));

        resolver.invalidate("acme");
        assert_eq!(resolver.resolve(Some("acme")).await.unwrap_err(), AuthError::TenantNotFound);
    }

    #[tokio::test]
    async fn unknown_subdomain_is_not_found_and_not_cached() {
        let (_, resolver) = resolver_with_acme().await;
        assert_eq!(resolver.resolve(Some("globex")).await.unwrap_err(), AuthError::TenantNotFound);
        assert_eq!(resolver.cached_len(), 0);
    }

    #[tokio::test]
    async fn invalidate_tenant_drops_all_bindings() {
        let (_, resolver) = resolver_with_acme().await;
        let t1 = TenantId::new("t1").unwrap();
        resolver.resolve(Some("acme")).await.unwrap();
        resolver.invalidate_tenant(&t1);
        assert_eq!(resolver.cached_len(), 0);
    }
}
