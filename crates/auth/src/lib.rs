//! `warden-auth`: pure authorization policy (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP, storage and identity
//! backends: it only decides, given already-verified facts, whether a request
//! may proceed.

pub mod aal;
pub mod authorize;
pub mod claims;
pub mod principal;
pub mod roles;
pub mod routes;

pub use aal::{Aal, AssuranceLevel};
pub use authorize::{
    TenantAccess, TenantPrecheck, check_route, check_step_up, decide_tenant_access,
    effective_tenant_roles, legacy_claim_matches, precheck_tenant_access, step_up_applies,
};
pub use claims::IdentityClaims;
pub use principal::{AuthenticatedUser, Identity, ServicePrincipal, TenantMembership};
pub use roles::{GlobalRole, TenantRole};
pub use routes::{RouteClass, RoutePrefixes, is_mutating_method};
