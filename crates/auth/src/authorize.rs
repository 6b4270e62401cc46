use std::collections::BTreeSet;

use serde::Serialize;

use warden_core::{AuthError, AuthResult, TenantId};

use crate::aal::AssuranceLevel;
use crate::principal::Identity;
use crate::roles::TenantRole;
use crate::routes::{RouteClass, is_mutating_method};

/// Tenant-scoped roles that apply to this request.
///
/// Inside a tenant scope these are the roles the session claims hold in that
/// tenant. On the root domain they are the roles held in the session's own
/// tenant, if the backend scopes sessions to one.
pub fn effective_tenant_roles(identity: &Identity, resolved_tenant: Option<&TenantId>) -> BTreeSet<TenantRole> {
    let scope = resolved_tenant.or_else(|| identity.session_tenant_id());
    let Some(tenant_id) = scope else {
        return BTreeSet::new();
    };
    identity
        .tenant_memberships()
        .iter()
        .find(|m| &m.tenant_id == tenant_id)
        .map(|m| m.roles.clone())
        .unwrap_or_default()
}

/// Route-class permission check.
///
/// - No IO
/// - No panics
/// - Global super admins pass every class
pub fn check_route(
    identity: &Identity,
    class: RouteClass,
    method: &str,
    resolved_tenant: Option<&TenantId>,
) -> AuthResult<()> {
    if class == RouteClass::Public || identity.is_super_admin() {
        return Ok(());
    }

    let roles = effective_tenant_roles(identity, resolved_tenant);
    let holds = |minimum: TenantRole| roles.iter().any(|r| r.satisfies(minimum));

    match class {
        RouteClass::Public | RouteClass::Authenticated => Ok(()),
        RouteClass::UserManagement => {
            if !is_mutating_method(method) || holds(TenantRole::CustomerAdmin) {
                Ok(())
            } else {
                Err(AuthError::forbidden("user management requires an administrator role"))
            }
        }
        RouteClass::Admin => {
            if holds(TenantRole::Admin) {
                Ok(())
            } else {
                Err(AuthError::forbidden("admin role required"))
            }
        }
        RouteClass::SuperAdmin => Err(AuthError::forbidden("super admin role required")),
    }
}

/// Whether the step-up rule covers this request.
///
/// Only interactive sessions are subject to it; service keys never reach the
/// privileged classes.
pub fn step_up_applies(identity: &Identity, class: RouteClass, method: &str) -> bool {
    !identity.is_service() && class.is_privileged() && is_mutating_method(method)
}

pub fn check_step_up(level: &AssuranceLevel) -> AuthResult<()> {
    if level.requires_step_up() {
        Err(AuthError::StepUpRequired)
    } else {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tenant access
// ─────────────────────────────────────────────────────────────────────────────

/// How a caller was admitted into a tenant scope.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantAccess {
    /// Global super admin; membership validation skipped.
    Bypass,
    /// Membership present in the verified session claims.
    SessionMembership,
    /// Active membership row in the relational store.
    StoreMembership,
    /// Legacy flat tenant claim.
    LegacyClaim,
}

impl TenantAccess {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantAccess::Bypass => "bypass",
            TenantAccess::SessionMembership => "session_membership",
            TenantAccess::StoreMembership => "store_membership",
            TenantAccess::LegacyClaim => "legacy_claim",
        }
    }
}

/// Outcome of the IO-free part of the tenant check.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TenantPrecheck {
    Granted(TenantAccess),
    /// Claims were not enough; ask the membership store.
    NeedsStoreLookup,
}

/// Steps that need no IO: bypass, then session claims.
pub fn precheck_tenant_access(identity: &Identity, tenant_id: &TenantId) -> TenantPrecheck {
    if identity.is_super_admin() {
        return TenantPrecheck::Granted(TenantAccess::Bypass);
    }
    if identity.tenant_memberships().iter().any(|m| &m.tenant_id == tenant_id) {
        return TenantPrecheck::Granted(TenantAccess::SessionMembership);
    }
    TenantPrecheck::NeedsStoreLookup
}

pub fn legacy_claim_matches(identity: &Identity, tenant_id: &TenantId) -> bool {
    identity.legacy_tenant_id() == Some(tenant_id)
}

/// Final decision once the store lookup (if any) has been made.
pub fn decide_tenant_access(
    identity: &Identity,
    tenant_id: &TenantId,
    store_has_active_membership: bool,
) -> AuthResult<TenantAccess> {
    match precheck_tenant_access(identity, tenant_id) {
        TenantPrecheck::Granted(access) => Ok(access),
        TenantPrecheck::NeedsStoreLookup if store_has_active_membership => Ok(TenantAccess::StoreMembership),
        TenantPrecheck::NeedsStoreLookup if legacy_claim_matches(identity, tenant_id) => {
            Ok(TenantAccess::LegacyClaim)
        }
        TenantPrecheck::NeedsStoreLookup => Err(AuthError::forbidden("no membership")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aal::Aal;
    use crate::claims::IdentityClaims;
    use crate::principal::{AuthenticatedUser, ServicePrincipal, TenantMembership};
    use crate::roles::GlobalRole;
    use proptest::prelude::*;
    use warden_core::{TokenId, UserId};

    fn tid(s: &str) -> TenantId {
        TenantId::new(s).unwrap()
    }

    fn user(memberships: Vec<TenantMembership>, global: &[GlobalRole], session_tenant: Option<&str>) -> Identity {
        Identity::User(AuthenticatedUser {
            user_id: UserId::new("u1").unwrap(),
            email: Some("u1@example.com".into()),
            email_verified: true,
            claims: IdentityClaims {
                global_roles: global.iter().copied().collect(),
                tenant_memberships: memberships,
                legacy_tenant_id: None,
            },
            tenant_id: session_tenant.map(tid),
        })
    }

    fn service() -> Identity {
        Identity::Service(ServicePrincipal {
            user_id: UserId::new("creator").unwrap(),
            token_id: TokenId::new(),
            scopes: BTreeSet::new(),
        })
    }

    #[test]
    fn plain_user_cannot_reach_admin_api() {
        let u = user(vec![TenantMembership::new(tid("t1"), [TenantRole::User])], &[], None);
        let err = check_route(&u, RouteClass::Admin, "GET", Some(&tid("t1"))).unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert!(check_route(&u, RouteClass::Authenticated, "GET", Some(&tid("t1"))).is_ok());
    }

    #[test]
    fn roles_only_count_in_their_own_tenant() {
        let u = user(vec![TenantMembership::new(tid("t1"), [TenantRole::Admin])], &[], None);
        assert!(check_route(&u, RouteClass::Admin, "GET", Some(&tid("t1"))).is_ok());
        assert!(check_route(&u, RouteClass::Admin, "GET", Some(&tid("t2"))).is_err());
    }

    #[test]
    fn root_domain_uses_session_tenant_roles() {
        let u = user(vec![TenantMembership::new(tid("t1"), [TenantRole::Admin])], &[], Some("t1"));
        assert!(check_route(&u, RouteClass::Admin, "POST", None).is_ok());

        let no_session_tenant = user(vec![TenantMembership::new(tid("t1"), [TenantRole::Admin])], &[], None);
        assert!(check_route(&no_session_tenant, RouteClass::Admin, "POST", None).is_err());
    }

    #[test]
    fn user_management_reads_are_open_writes_need_admin() {
        let plain = user(vec![TenantMembership::new(tid("t1"), [TenantRole::User])], &[], None);
        let t1 = tid("t1");
        assert!(check_route(&plain, RouteClass::UserManagement, "GET", Some(&t1)).is_ok());
        assert!(check_route(&plain, RouteClass::UserManagement, "POST", Some(&t1)).is_err());

        let customer_admin = user(vec![TenantMembership::new(t1.clone(), [TenantRole::CustomerAdmin])], &[], None);
        assert!(check_route(&customer_admin, RouteClass::UserManagement, "DELETE", Some(&t1)).is_ok());
        assert!(check_route(&customer_admin, RouteClass::Admin, "GET", Some(&t1)).is_err());
    }

    #[test]
    fn customer_admin_writes_users_under_overlapping_admin_prefix() {
        let prefixes = crate::routes::RoutePrefixes {
            user_management: "/admin-api/users".into(),
            ..Default::default()
        };
        let t1 = tid("t1");
        let customer_admin = user(vec![TenantMembership::new(t1.clone(), [TenantRole::CustomerAdmin])], &[], None);
        let class = prefixes.classify("/admin-api/users/42");
        assert!(check_route(&customer_admin, class, "POST", Some(&t1)).is_ok());
        let class = prefixes.classify("/admin-api/memberships");
        assert!(check_route(&customer_admin, class, "POST", Some(&t1)).is_err());
    }

    #[test]
    fn super_admin_passes_everything_without_memberships() {
        let root = user(vec![], &[GlobalRole::SuperAdmin], None);
        for class in [RouteClass::UserManagement, RouteClass::Admin, RouteClass::SuperAdmin] {
            assert!(check_route(&root, class, "DELETE", Some(&tid("acme"))).is_ok());
            assert!(check_route(&root, class, "DELETE", None).is_ok());
        }
    }

    #[test]
    fn superadmin_class_rejects_tenant_admins() {
        let admin = user(vec![TenantMembership::new(tid("t1"), [TenantRole::Admin])], &[], None);
        assert!(check_route(&admin, RouteClass::SuperAdmin, "GET", Some(&tid("t1"))).is_err());
    }

    #[test]
    fn step_up_scope() {
        let u = user(vec![], &[], None);
        assert!(step_up_applies(&u, RouteClass::UserManagement, "PATCH"));
        assert!(step_up_applies(&u, RouteClass::SuperAdmin, "POST"));
        assert!(!step_up_applies(&u, RouteClass::UserManagement, "GET"));
        assert!(!step_up_applies(&u, RouteClass::Authenticated, "POST"));
        assert!(!step_up_applies(&service(), RouteClass::Admin, "POST"));
    }

    #[test]
    fn step_up_decision() {
        let low = AssuranceLevel::new(Aal::Aal1, Aal::Aal2, false);
        assert_eq!(check_step_up(&low), Err(AuthError::StepUpRequired));
        let fresh = AssuranceLevel::new(Aal::Aal2, Aal::Aal2, true);
        assert!(check_step_up(&fresh).is_ok());
    }

    #[test]
    fn tenant_access_order() {
        let t1 = tid("t1");
        let member = user(vec![TenantMembership::new(t1.clone(), [TenantRole::User])], &[], None);
        assert_eq!(decide_tenant_access(&member, &t1, false), Ok(TenantAccess::SessionMembership));

        let outsider = user(vec![], &[], None);
        assert_eq!(precheck_tenant_access(&outsider, &t1), TenantPrecheck::NeedsStoreLookup);
        assert_eq!(decide_tenant_access(&outsider, &t1, true), Ok(TenantAccess::StoreMembership));
        assert_eq!(
            decide_tenant_access(&outsider, &t1, false),
            Err(AuthError::forbidden("no membership"))
        );

        let mut legacy = outsider.clone();
        if let Identity::User(u) = &mut legacy {
            u.claims.legacy_tenant_id = Some(t1.clone());
        }
        assert_eq!(decide_tenant_access(&legacy, &t1, false), Ok(TenantAccess::LegacyClaim));

        let root = user(vec![], &[GlobalRole::SuperAdmin], None);
        assert_eq!(decide_tenant_access(&root, &t1, false), Ok(TenantAccess::Bypass));
    }

    const TENANTS: [&str; 5] = ["t0", "t1", "t2", "t3", "t4"];

    fn tenant_subset() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(0usize..TENANTS.len(), 0..TENANTS.len())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: a non-bypass caller is only ever admitted into a tenant
        /// it holds a membership for (session, store or legacy claim).
        #[test]
        fn tenant_access_never_crosses_membership(
            session in tenant_subset(),
            store in tenant_subset(),
            legacy in prop::option::of(0usize..TENANTS.len()),
            target in 0usize..TENANTS.len(),
        ) {
            let memberships = session
                .iter()
                .map(|i| TenantMembership::new(tid(TENANTS[*i]), [TenantRole::User]))
                .collect();
            let mut identity = user(memberships, &[], None);
            if let Identity::User(u) = &mut identity {
                u.claims.legacy_tenant_id = legacy.map(|i| tid(TENANTS[i]));
            }
            let target_id = tid(TENANTS[target]);
            let store_hit = store.contains(&target);

            let decision = decide_tenant_access(&identity, &target_id, store_hit);
            let entitled = session.contains(&target) || store_hit || legacy == Some(target);

            prop_assert_eq!(decision.is_ok(), entitled);
            prop_assert_ne!(decision.ok(), Some(TenantAccess::Bypass));
        }

        /// Property: tenant-scoped roles never leak into another tenant's admin check.
        #[test]
        fn admin_role_is_tenant_scoped(owner in 0usize..TENANTS.len(), target in 0usize..TENANTS.len()) {
            let identity = user(
                vec![TenantMembership::new(tid(TENANTS[owner]), [TenantRole::Admin])],
                &[],
                None,
            );
            let allowed = check_route(&identity, RouteClass::Admin, "POST", Some(&tid(TENANTS[target]))).is_ok();
            prop_assert_eq!(allowed, owner == target);
        }
    }
}
