//! `warden-infra`: persistence and the services built on it.
//!
//! Every store has a Postgres implementation and an in-memory twin with the
//! same semantics; the composition root picks one set via [`Stores`].

pub mod api_tokens;
pub mod config;
pub mod db;
pub mod membership;
pub mod stores;
pub mod tenants;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::WardenConfig;
pub use stores::Stores;
