use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use warden_core::{TenantId, TokenId, UserId};

use crate::claims::IdentityClaims;
use crate::roles::{GlobalRole, TenantRole};

/// A user's membership in a tenant.
///
/// This is an authorization boundary object: roles listed here apply inside
/// `tenant_id` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: BTreeSet<TenantRole>,
}

impl TenantMembership {
    pub fn new(tenant_id: TenantId, roles: impl IntoIterator<Item = TenantRole>) -> Self {
        Self {
            tenant_id,
            roles: roles.into_iter().collect(),
        }
    }

    /// Highest role held in this membership.
    pub fn highest_role(&self) -> Option<TenantRole> {
        self.roles.iter().max().copied()
    }
}

/// Identity verified by the active identity provider for one request.
///
/// Produced fresh per request by the provider adapter; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub email: Option<String>,
    pub email_verified: bool,
    pub claims: IdentityClaims,
    /// Tenant the session was issued for, if the backend scopes sessions.
    pub tenant_id: Option<TenantId>,
}

impl AuthenticatedUser {
    pub fn tenant_memberships(&self) -> &[TenantMembership] {
        &self.claims.tenant_memberships
    }

    pub fn membership_for(&self, tenant_id: &TenantId) -> Option<&TenantMembership> {
        self.claims.membership_for(tenant_id)
    }

    pub fn global_roles(&self) -> &BTreeSet<GlobalRole> {
        &self.claims.global_roles
    }

    pub fn is_super_admin(&self) -> bool {
        self.claims.is_super_admin()
    }
}

/// Service-to-service caller authenticated by a long-lived API token.
///
/// Acts on behalf of the user who created the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServicePrincipal {
    pub user_id: UserId,
    pub token_id: TokenId,
    pub scopes: BTreeSet<String>,
}

/// Request-scoped identity after authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    User(AuthenticatedUser),
    Service(ServicePrincipal),
}

impl Identity {
    pub fn user_id(&self) -> &UserId {
        match self {
            Identity::User(u) => &u.user_id,
            Identity::Service(s) => &s.user_id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Identity::User(u) => u.email.as_deref(),
            Identity::Service(_) => None,
        }
    }

    /// Session tenant (user sessions only).
    pub fn session_tenant_id(&self) -> Option<&TenantId> {
        match self {
            Identity::User(u) => u.tenant_id.as_ref(),
            Identity::Service(_) => None,
        }
    }

    /// Memberships carried by the session claims (empty for service callers).
    pub fn tenant_memberships(&self) -> &[TenantMembership] {
        match self {
            Identity::User(u) => u.tenant_memberships(),
            Identity::Service(_) => &[],
        }
    }

    /// Legacy flat tenant claim (user sessions only).
    pub fn legacy_tenant_id(&self) -> Option<&TenantId> {
        match self {
            Identity::User(u) => u.claims.legacy_tenant_id.as_ref(),
            Identity::Service(_) => None,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        match self {
            Identity::User(u) => u.is_super_admin(),
            Identity::Service(_) => false,
        }
    }

    pub fn scopes(&self) -> Option<&BTreeSet<String>> {
        match self {
            Identity::User(_) => None,
            Identity::Service(s) => Some(&s.scopes),
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Identity::Service(_))
    }
}
