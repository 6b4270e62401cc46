//! Tenants: the relational directory, subdomain resolution and lifecycle.

pub mod directory;
pub mod resolver;
pub mod service;

pub use directory::{InMemoryTenantDirectory, PostgresTenantDirectory};
pub use resolver::TenantResolver;
pub use service::TenantService;
