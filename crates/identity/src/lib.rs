//! `warden-identity`: identity backend capabilities.
//!
//! Business code depends on the traits in this crate only. Concrete backends
//! live under [`backends`] and are selected once at start-up through the
//! [`ProviderRegistry`].

pub mod backends;
pub mod client;
pub mod config;
pub mod credential;
pub mod provider;
pub mod registry;
pub mod tenant;

pub use client::{IdentityClient, NewUser, UserRecord, UserUpdate};
pub use config::{ManagedCloudConfig, ProviderConfig, SelfHostedConfig};
pub use credential::SessionCredential;
pub use provider::{IdentityProvider, TenantClientCache};
pub use registry::{ProviderConstructor, ProviderDeps, ProviderKind, ProviderRegistry};
pub use tenant::{NewTenant, SignInOptions, Tenant, TenantDirectory, TenantManager, TenantUpdate, normalize_subdomain};
