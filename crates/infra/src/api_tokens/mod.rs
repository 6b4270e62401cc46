//! Long-lived API tokens for service-to-service calls.

pub mod secret;
pub mod service;
pub mod store;
pub mod types;

pub use service::{ApiTokenService, DEFAULT_TTL_DAYS, MAX_TTL_DAYS, clamp_ttl_days};
pub use store::{ApiTokenStore, InMemoryApiTokenStore, PostgresApiTokenStore};
pub use types::{ApiToken, ClientApplication, IssueTokenRequest, IssuedToken, TokenAuditAction, TokenAuditEntry};
