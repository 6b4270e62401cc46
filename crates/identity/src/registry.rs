//! Provider registry.
//!
//! Maps a backend kind to a constructor. The registry is an ordinary value
//! owned by the composition root: registration needs `&mut`, and once
//! [`ProviderRegistry::build`] has returned, the active provider is an
//! immutable `Arc` shared by every request.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use warden_core::{AuthError, AuthResult};

use crate::backends::{managed_cloud, self_hosted};
use crate::config::ProviderConfig;
use crate::provider::{IdentityProvider, TenantClientCache};
use crate::tenant::TenantDirectory;

/// Backend identifier, e.g. `managed_cloud`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderKind(String);

impl ProviderKind {
    pub const MANAGED_CLOUD: &'static str = "managed_cloud";
    pub const SELF_HOSTED: &'static str = "self_hosted";

    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into().trim().to_ascii_lowercase())
    }

    pub fn managed_cloud() -> Self {
        Self::new(Self::MANAGED_CLOUD)
    }

    pub fn self_hosted() -> Self {
        Self::new(Self::SELF_HOSTED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collaborators handed to every provider constructor.
#[derive(Clone)]
pub struct ProviderDeps {
    pub directory: Arc<dyn TenantDirectory>,
    pub client_cache: Arc<TenantClientCache>,
}

impl ProviderDeps {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self {
            directory,
            client_cache: Arc::new(TenantClientCache::new()),
        }
    }
}

pub type ProviderConstructor =
    Arc<dyn Fn(&ProviderConfig, ProviderDeps) -> AuthResult<Arc<dyn IdentityProvider>> + Send + Sync>;

#[derive(Default)]
pub struct ProviderRegistry {
    constructors: HashMap<ProviderKind, ProviderConstructor>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in managed-cloud and self-hosted backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(ProviderKind::managed_cloud(), Arc::new(managed_cloud::build_provider));
        registry.register(ProviderKind::self_hosted(), Arc::new(self_hosted::build_provider));
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register(&mut self, kind: ProviderKind, constructor: ProviderConstructor) -> Option<ProviderConstructor> {
        self.constructors.insert(kind, constructor)
    }

    pub fn resolve(&self, kind: &ProviderKind) -> AuthResult<ProviderConstructor> {
        self.constructors
            .get(kind)
            .cloned()
            .ok_or_else(|| AuthError::invalid(format!("unknown identity provider '{kind}'")))
    }

    pub fn kinds(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<_> = self.constructors.keys().cloned().collect();
        kinds.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        kinds
    }

    /// Construct the provider selected by `config.kind`.
    pub fn build(&self, config: &ProviderConfig, deps: ProviderDeps) -> AuthResult<Arc<dyn IdentityProvider>> {
        let constructor = self.resolve(&config.kind)?;
        let provider = constructor(config, deps)?;
        tracing::info!(provider = %config.kind, "identity provider selected");
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_kinds_are_registered() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(
            registry.kinds(),
            vec![ProviderKind::managed_cloud(), ProviderKind::self_hosted()]
        );
    }

    #[test]
    fn unknown_kind_is_invalid() {
        let registry = ProviderRegistry::with_builtin();
        let err = registry.resolve(&ProviderKind::new("ldap")).err().unwrap();
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn kind_is_normalized() {
        assert_eq!(ProviderKind::new(" Managed_Cloud "), ProviderKind::managed_cloud());
    }
}
