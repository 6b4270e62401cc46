//! Typed identity claims.
//!
//! Both identity backends store authorization facts next to the user record
//! (custom attributes / public metadata). Adapters map their native shape into
//! [`IdentityClaims`] with [`IdentityClaims::from_json`] and write it back with
//! [`IdentityClaims::to_json`].
//!
//! Wire shape:
//!
//! ```json
//! {
//!   "global_roles": ["SUPER_ADMIN"],
//!   "tenant_memberships": [{ "tenant_id": "t1", "roles": ["ADMIN"] }],
//!   "tenant_id": "t1"
//! }
//! ```

use std::collections::BTreeSet;

use serde_json::{Map, Value, json};

use warden_core::TenantId;

use crate::principal::TenantMembership;
use crate::roles::{GlobalRole, TenantRole};

/// Authorization facts carried by a verified session.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IdentityClaims {
    pub global_roles: BTreeSet<GlobalRole>,
    pub tenant_memberships: Vec<TenantMembership>,
    /// Legacy single-tenant claim written before memberships existed.
    #[serde(rename = "tenant_id", skip_serializing_if = "Option::is_none")]
    pub legacy_tenant_id: Option<TenantId>,
}

impl IdentityClaims {
    pub fn is_super_admin(&self) -> bool {
        self.global_roles.contains(&GlobalRole::SuperAdmin)
    }

    pub fn membership_for(&self, tenant_id: &TenantId) -> Option<&TenantMembership> {
        self.tenant_memberships.iter().find(|m| &m.tenant_id == tenant_id)
    }

    /// Parse claims leniently.
    ///
    /// Unknown role strings and malformed membership entries are dropped (logged
    /// at debug); a non-object value yields empty claims. A session is never
    /// rejected because of a claims shape this build does not understand.
    pub fn from_json(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        let global_roles = obj
            .get("global_roles")
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|r| match r.parse::<GlobalRole>() {
                        Ok(role) => Some(role),
                        Err(_) => {
                            tracing::debug!(role = r, "dropping unknown global role");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut tenant_memberships: Vec<TenantMembership> = Vec::new();
        if let Some(entries) = obj.get("tenant_memberships").and_then(Value::as_array) {
            for entry in entries {
                let Some(tenant_id) = entry
                    .get("tenant_id")
                    .and_then(Value::as_str)
                    .and_then(|t| TenantId::new(t).ok())
                else {
                    tracing::debug!("dropping membership claim without tenant_id");
                    continue;
                };
                let roles = parse_tenant_roles(entry.get("roles"));
                // Duplicate tenant entries merge their roles.
                match tenant_memberships.iter_mut().find(|m| m.tenant_id == tenant_id) {
                    Some(existing) => existing.roles.extend(roles),
                    None => tenant_memberships.push(TenantMembership { tenant_id, roles }),
                }
            }
        }

        let legacy_tenant_id = obj
            .get("tenant_id")
            .and_then(Value::as_str)
            .and_then(|t| TenantId::new(t).ok());

        Self {
            global_roles,
            tenant_memberships,
            legacy_tenant_id,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "global_roles".into(),
            Value::Array(self.global_roles.iter().map(|r| json!(r.as_str())).collect()),
        );
        obj.insert(
            "tenant_memberships".into(),
            Value::Array(
                self.tenant_memberships
                    .iter()
                    .map(|m| {
                        json!({
                            "tenant_id": m.tenant_id.as_str(),
                            "roles": m.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                        })
                    })
                    .collect(),
            ),
        );
        if let Some(t) = &self.legacy_tenant_id {
            obj.insert("tenant_id".into(), json!(t.as_str()));
        }
        Value::Object(obj)
    }

    /// Replace the membership list, keeping global roles and the legacy claim.
    pub fn with_memberships(mut self, memberships: Vec<TenantMembership>) -> Self {
        self.tenant_memberships = memberships;
        self
    }
}

fn parse_tenant_roles(value: Option<&Value>) -> BTreeSet<TenantRole> {
    let Some(items) = value.and_then(Value::as_array) else {
        return BTreeSet::new();
    };
    items
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|r| match r.parse::<TenantRole>() {
            Ok(role) => Some(role),
            Err(_) => {
                tracing::debug!(role = r, "dropping unknown tenant role");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(s: &str) -> TenantId {
        TenantId::new(s).unwrap()
    }

    #[test]
    fn parses_full_shape() {
        let claims = IdentityClaims::from_json(&json!({
            "global_roles": ["SUPER_ADMIN"],
            "tenant_memberships": [
                { "tenant_id": "t1", "roles": ["ADMIN", "USER"] },
                { "tenant_id": "t2", "roles": ["customer_admin"] }
            ],
            "tenant_id": "t1"
        }));

        assert!(claims.is_super_admin());
        assert_eq!(claims.tenant_memberships.len(), 2);
        assert!(claims.membership_for(&tid("t2")).unwrap().roles.contains(&TenantRole::CustomerAdmin));
        assert_eq!(claims.legacy_tenant_id, Some(tid("t1")));
    }

    #[test]
    fn unknown_roles_and_bad_entries_are_dropped() {
        let claims = IdentityClaims::from_json(&json!({
            "global_roles": ["GOD_MODE"],
            "tenant_memberships": [
                { "roles": ["ADMIN"] },
                { "tenant_id": "t1", "roles": ["OWNER", "USER", 7] }
            ]
        }));

        assert!(claims.global_roles.is_empty());
        assert_eq!(claims.tenant_memberships.len(), 1);
        assert_eq!(
            claims.tenant_memberships[0].roles,
            BTreeSet::from([TenantRole::User])
        );
    }

    #[test]
    fn non_object_yields_empty_claims() {
        assert_eq!(IdentityClaims::from_json(&Value::Null), IdentityClaims::default());
        assert_eq!(IdentityClaims::from_json(&json!("x")), IdentityClaims::default());
    }

    #[test]
    fn duplicate_tenant_entries_merge() {
        let claims = IdentityClaims::from_json(&json!({
            "tenant_memberships": [
                { "tenant_id": "t1", "roles": ["USER"] },
                { "tenant_id": "t1", "roles": ["ADMIN"] }
            ]
        }));
        assert_eq!(claims.tenant_memberships.len(), 1);
        assert_eq!(claims.tenant_memberships[0].roles.len(), 2);
    }

    #[test]
    fn written_claims_parse_back_identically() {
        let claims = IdentityClaims {
            global_roles: BTreeSet::from([GlobalRole::SuperAdmin]),
            tenant_memberships: vec![TenantMembership::new(tid("t9"), [TenantRole::Admin])],
            legacy_tenant_id: Some(tid("t9")),
        };
        assert_eq!(IdentityClaims::from_json(&claims.to_json()), claims);
    }
}
