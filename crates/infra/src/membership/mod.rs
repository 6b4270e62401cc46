//! Tenant memberships: persistence and the service that keeps backend claims
//! in step with it.

pub mod service;
pub mod store;

pub use service::MembershipService;
pub use store::{InMemoryMembershipStore, MembershipRecord, MembershipStatus, MembershipStore, PostgresMembershipStore};
