//! `warden-core`: shared building blocks for the identity/authorization core.
//!
//! This crate contains **pure** primitives (no HTTP, no storage, no backend IO).

pub mod cache;
pub mod error;
pub mod id;

pub use cache::KeyedCache;
pub use error::{AuthError, AuthResult, UnauthenticatedReason};
pub use id::{ClientApplicationId, TenantId, TokenId, UserId};
