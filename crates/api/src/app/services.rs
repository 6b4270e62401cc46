//! Composition root: builds the provider, stores and services once at
//! start-up and hands them to the router.

use std::sync::Arc;

use warden_auth::RoutePrefixes;
use warden_identity::{IdentityProvider, ProviderDeps, ProviderRegistry};
use warden_infra::{
    Stores, WardenConfig,
    api_tokens::ApiTokenService,
    config::{DEFAULT_BASE_DOMAIN, DEFAULT_SESSION_COOKIE},
    db,
    membership::MembershipService,
    tenants::{TenantResolver, TenantService},
};

/// HTTP-facing settings taken from [`WardenConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub route_prefixes: RoutePrefixes,
    pub base_domain: String,
    pub root_subdomains: Vec<String>,
    pub session_cookie: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            route_prefixes: RoutePrefixes::default(),
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            root_subdomains: vec!["www".to_string()],
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
        }
    }
}

impl HttpSettings {
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            route_prefixes: config.route_prefixes.clone(),
            base_domain: config.base_domain.clone(),
            root_subdomains: config.root_subdomains.clone(),
            session_cookie: config.session_cookie.clone(),
        }
    }
}

/// Everything a request handler or middleware may reach.
pub struct AppServices {
    pub settings: HttpSettings,
    pub provider: Arc<dyn IdentityProvider>,
    pub resolver: Arc<TenantResolver>,
    pub memberships: Arc<MembershipService>,
    pub tenants: TenantService,
    pub api_tokens: ApiTokenService,
}

impl AppServices {
    /// Wire services over an already built provider and store set.
    ///
    /// `stores.directory` must be the directory the provider was built with.
    pub fn new(settings: HttpSettings, provider: Arc<dyn IdentityProvider>, stores: Stores) -> Self {
        let resolver = Arc::new(TenantResolver::new(
            stores.directory.clone(),
            settings.root_subdomains.iter().cloned(),
        ));
        let memberships = Arc::new(MembershipService::new(stores.memberships.clone(), provider.clone()));
        let tenants = TenantService::new(provider.clone(), resolver.clone(), memberships.clone());
        let api_tokens = ApiTokenService::new(stores.api_tokens.clone());

        Self {
            settings,
            provider,
            resolver,
            memberships,
            tenants,
            api_tokens,
        }
    }
}

/// Build the process-wide services from configuration.
///
/// Without `DATABASE_URL` everything runs on in-memory stores, which is only
/// useful for local development.
pub async fn build_services(config: &WardenConfig) -> anyhow::Result<AppServices> {
    let stores = match &config.database_url {
        Some(url) => Stores::postgres(db::connect(url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            Stores::in_memory()
        }
    };

    let registry = ProviderRegistry::with_builtin();
    let provider = registry.build(&config.provider, ProviderDeps::new(stores.directory.clone()))?;
    tracing::info!(provider = %provider.kind(), "identity provider selected");

    Ok(AppServices::new(HttpSettings::from_config(config), provider, stores))
}
