//! Membership service: the ground truth for per-tenant roles, plus the
//! denormalised copy kept in the identity backend's claims.
//!
//! Store writes commit first; the claim copy is then rewritten from the
//! user's active rows. If that second step fails the caller receives
//! `BackendUnavailable` and may retry [`MembershipService::sync_claims`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use warden_auth::{TenantMembership, TenantRole};
use warden_core::{AuthError, AuthResult, TenantId, UserId};
use warden_identity::{IdentityClient, IdentityProvider, UserRecord};

use super::store::{MembershipRecord, MembershipStatus, MembershipStore};

pub struct MembershipService {
    store: Arc<dyn MembershipStore>,
    provider: Arc<dyn IdentityProvider>,
}

impl MembershipService {
    pub fn new(store: Arc<dyn MembershipStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { store, provider }
    }

    pub fn store(&self) -> &Arc<dyn MembershipStore> {
        &self.store
    }

    /// Give `user_id` the listed roles in `tenant_id` and make the membership
    /// active. Roles already held are kept.
    #[instrument(skip(self, roles), fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn grant(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        roles: BTreeSet<TenantRole>,
        granted_by: &UserId,
    ) -> AuthResult<MembershipRecord> {
        require_roles(&roles)?;
        self.ensure_user_exists(user_id, tenant_id).await?;

        let now = Utc::now();
        let record = match self.store.get(user_id, tenant_id).await? {
            Some(mut existing) => {
                existing.roles.extend(roles);
                if existing.status != MembershipStatus::Active {
                    existing.status = MembershipStatus::Active;
                    existing.joined_at = Some(now);
                }
                existing.updated_at = now;
                existing
            }
            None => MembershipRecord {
                user_id: user_id.clone(),
                tenant_id: tenant_id.clone(),
                roles,
                status: MembershipStatus::Active,
                invited_by: Some(granted_by.clone()),
                joined_at: Some(now),
                created_at: now,
                updated_at: now,
            },
        };
        self.store.upsert(&record).await?;
        tracing::info!(
            target: "audit",
            tenant_id = %tenant_id,
            user_id = %user_id,
            granted_by = %granted_by,
            roles = ?record.roles,
            "membership granted"
        );

        self.sync_after_write(user_id).await?;
        Ok(record)
    }

    /// Record a pending membership. It grants nothing until activated.
    #[instrument(skip(self, roles), fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn invite(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        roles: BTreeSet<TenantRole>,
        invited_by: &UserId,
    ) -> AuthResult<MembershipRecord> {
        require_roles(&roles)?;
        if let Some(existing) = self.store.get(user_id, tenant_id).await? {
            return Err(AuthError::conflict(format!(
                "user already has a {} membership in this tenant",
                existing.status.as_str()
            )));
        }
        self.ensure_user_exists(user_id, tenant_id).await?;

        let now = Utc::now();
        let record = MembershipRecord {
            user_id: user_id.clone(),
            tenant_id: tenant_id.clone(),
            roles,
            status: MembershipStatus::Invited,
            invited_by: Some(invited_by.clone()),
            joined_at: None,
            created_at: now,
            updated_at: now,
        };
        self.store.upsert(&record).await?;
        tracing::info!(target: "audit", tenant_id = %tenant_id, user_id = %user_id, invited_by = %invited_by, "membership invited");
        Ok(record)
    }

    /// Remove the membership. Returns `false` when there was none.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn revoke(&self, tenant_id: &TenantId, user_id: &UserId) -> AuthResult<bool> {
        let Some(existing) = self.store.get(user_id, tenant_id).await? else {
            return Ok(false);
        };
        self.store.delete(user_id, tenant_id).await?;
        tracing::info!(target: "audit", tenant_id = %tenant_id, user_id = %user_id, "membership revoked");

        if existing.is_active() {
            self.sync_after_write(user_id).await?;
        }
        Ok(true)
    }

    /// Replace the role set of an existing membership.
    #[instrument(skip(self, roles), fields(tenant_id = %tenant_id, user_id = %user_id), err)]
    pub async fn set_roles(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        roles: BTreeSet<TenantRole>,
    ) -> AuthResult<MembershipRecord> {
        require_roles(&roles)?;
        self.modify(tenant_id, user_id, |record| {
            record.roles = roles;
        })
        .await
    }

    pub async fn suspend(&self, tenant_id: &TenantId, user_id: &UserId) -> AuthResult<MembershipRecord> {
        self.modify(tenant_id, user_id, |record| {
            record.status = MembershipStatus::Suspended;
        })
        .await
    }

    /// Activate an invited or suspended membership.
    pub async fn activate(&self, tenant_id: &TenantId, user_id: &UserId) -> AuthResult<MembershipRecord> {
        self.modify(tenant_id, user_id, |record| {
            if record.status != MembershipStatus::Active {
                record.status = MembershipStatus::Active;
                record.joined_at.get_or_insert_with(Utc::now);
            }
        })
        .await
    }

    /// The membership, if it exists and is active.
    pub async fn find_active(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<Option<MembershipRecord>> {
        Ok(self
            .store
            .get(user_id, tenant_id)
            .await?
            .filter(MembershipRecord::is_active))
    }

    pub async fn has_active_membership(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<bool> {
        Ok(self.find_active(user_id, tenant_id).await?.is_some())
    }

    pub async fn list_for_user(&self, user_id: &UserId) -> AuthResult<Vec<MembershipRecord>> {
        self.store.list_for_user(user_id).await
    }

    pub async fn list_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>> {
        self.store.list_for_tenant(tenant_id).await
    }

    /// Rewrite the user's backend claims from their active store rows.
    ///
    /// Global roles and the legacy tenant claim are carried over unchanged.
    #[instrument(skip(self), fields(user_id = %user_id), err)]
    pub async fn sync_claims(&self, user_id: &UserId) -> AuthResult<()> {
        let records = self.store.list_for_user(user_id).await?;
        let pools: Vec<TenantId> = records.iter().map(|r| r.tenant_id.clone()).collect();
        let (client, user) = self.locate_user(user_id, &pools).await?;

        let active: Vec<TenantMembership> = records
            .iter()
            .filter(|r| r.is_active())
            .map(MembershipRecord::to_membership)
            .collect();
        let claims = user.claims.clone().with_memberships(active);
        if claims == user.claims {
            tracing::debug!(user_id = %user_id, "claims already in sync");
            return Ok(());
        }
        client.set_claims(user_id, &claims).await?;
        tracing::debug!(user_id = %user_id, memberships = claims.tenant_memberships.len(), "claims synchronised");
        Ok(())
    }

    /// Drop every membership of a deleted tenant and refresh the affected
    /// users' claims. Claim refresh failures are logged, not returned.
    #[instrument(skip(self, members), fields(tenant_id = %tenant_id), err)]
    pub async fn purge_tenant(&self, tenant_id: &TenantId, members: Vec<MembershipRecord>) -> AuthResult<usize> {
        let mut removed = self.store.delete_for_tenant(tenant_id).await?;
        for member in members {
            if !removed.iter().any(|r| r.user_id == member.user_id) {
                removed.push(member);
            }
        }
        for record in &removed {
            if let Err(err) = self.sync_claims(&record.user_id).await {
                tracing::warn!(
                    tenant_id = %tenant_id,
                    user_id = %record.user_id,
                    error = %err,
                    "failed to refresh claims after tenant deletion"
                );
            }
        }
        Ok(removed.len())
    }

    async fn modify<F>(&self, tenant_id: &TenantId, user_id: &UserId, change: F) -> AuthResult<MembershipRecord>
    where
        F: FnOnce(&mut MembershipRecord),
    {
        let mut record = self
            .store
            .get(user_id, tenant_id)
            .await?
            .ok_or_else(|| AuthError::invalid("membership does not exist"))?;
        let before = record.clone();
        change(&mut record);
        if record == before {
            return Ok(record);
        }
        record.updated_at = Utc::now();
        self.store.upsert(&record).await?;
        tracing::info!(
            target: "audit",
            tenant_id = %tenant_id,
            user_id = %user_id,
            status = record.status.as_str(),
            roles = ?record.roles,
            "membership changed"
        );

        if before.is_active() || record.is_active() {
            self.sync_after_write(user_id).await?;
        }
        Ok(record)
    }

    async fn ensure_user_exists(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<()> {
        let mut pools: Vec<TenantId> = self
            .store
            .list_for_user(user_id)
            .await?
            .into_iter()
            .map(|r| r.tenant_id)
            .collect();
        pools.push(tenant_id.clone());
        self.locate_user(user_id, &pools).await.map(|_| ())
    }

    /// Find the pool holding `user_id`: the root pool first, then the pools of
    /// the given tenants (backends with per-tenant pools).
    async fn locate_user(
        &self,
        user_id: &UserId,
        tenant_pools: &[TenantId],
    ) -> AuthResult<(Arc<dyn IdentityClient>, UserRecord)> {
        let root = self.provider.client();
        match root.get_user(user_id).await {
            Ok(user) => return Ok((root, user)),
            Err(AuthError::UserNotFound) => {}
            Err(err) => return Err(err),
        }
        for tenant_id in tenant_pools {
            let client = self.provider.client_for(tenant_id)?;
            if client.tenant_id().is_none() {
                continue;
            }
            match client.get_user(user_id).await {
                Ok(user) => return Ok((client, user)),
                Err(AuthError::UserNotFound) => {}
                Err(err) => return Err(err),
            }
        }
        Err(AuthError::UserNotFound)
    }

    async fn sync_after_write(&self, user_id: &UserId) -> AuthResult<()> {
        self.sync_claims(user_id).await.map_err(|err| {
            tracing::warn!(user_id = %user_id, error = %err, "membership saved but claim sync failed");
            match err {
                AuthError::BackendUnavailable(_) => err,
                other => AuthError::backend(format!("claim sync failed: {other}")),
            }
        })
    }
}

fn require_roles(roles: &BTreeSet<TenantRole>) -> AuthResult<()> {
    if roles.is_empty() {
        return Err(AuthError::invalid("at least one role is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::InMemoryMembershipStore;
    use crate::test_support::FakeProvider;

    fn ids() -> (TenantId, UserId, UserId) {
        (
            TenantId::new("t1").unwrap(),
            UserId::new("u1").unwrap(),
            UserId::new("admin").unwrap(),
        )
    }

    fn roles(r: &[TenantRole]) -> BTreeSet<TenantRole> {
        r.iter().copied().collect()
    }

    fn service(provider: Arc<FakeProvider>) -> MembershipService {
        MembershipService::new(InMemoryMembershipStore::arc(), provider)
    }

    #[tokio::test]
    async fn grant_writes_store_and_claims() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        let record = svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap();
        assert!(record.is_active());
        assert!(svc.find_active(&u1, &t1).await.unwrap().is_some());

        let claims = provider.claims_of(&u1);
        let membership = claims.membership_for(&t1).unwrap();
        assert_eq!(membership.roles, roles(&[TenantRole::User]));
    }

    #[tokio::test]
    async fn grant_merges_roles() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap();
        let record = svc.grant(&t1, &u1, roles(&[TenantRole::Admin]), &admin).await.unwrap();
        assert_eq!(record.roles, roles(&[TenantRole::User, TenantRole::Admin]));
    }

    #[tokio::test]
    async fn grant_to_unknown_user_fails_before_writing() {
        let provider = FakeProvider::with_users(&[]);
        let svc = service(provider);
        let (t1, u1, admin) = ids();

        let err = svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap_err();
        assert_eq!(err, AuthError::UserNotFound);
        assert!(svc.list_for_user(&u1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_role_set_is_invalid() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider);
        let (t1, u1, admin) = ids();
        let err = svc.grant(&t1, &u1, BTreeSet::new(), &admin).await.unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[tokio::test]
    async fn suspended_membership_is_not_active_and_leaves_claims() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        svc.grant(&t1, &u1, roles(&[TenantRole::Admin]), &admin).await.unwrap();
        svc.suspend(&t1, &u1).await.unwrap();

        assert!(svc.find_active(&u1, &t1).await.unwrap().is_none());
        assert!(provider.claims_of(&u1).membership_for(&t1).is_none());

        svc.activate(&t1, &u1).await.unwrap();
        assert!(provider.claims_of(&u1).membership_for(&t1).is_some());
    }

    #[tokio::test]
    async fn invite_grants_nothing_until_activated() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        let record = svc.invite(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap();
        assert_eq!(record.status, MembershipStatus::Invited);
        assert!(record.joined_at.is_none());
        assert!(!svc.has_active_membership(&u1, &t1).await.unwrap());

        let again = svc.invite(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap_err();
        assert_eq!(again.code(), "conflict");

        let active = svc.activate(&t1, &u1).await.unwrap();
        assert!(active.joined_at.is_some());
        assert!(svc.has_active_membership(&u1, &t1).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_removes_membership_and_claim() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap();
        assert!(svc.revoke(&t1, &u1).await.unwrap());
        assert!(!svc.revoke(&t1, &u1).await.unwrap());
        assert!(provider.claims_of(&u1).tenant_memberships.is_empty());
    }

    #[tokio::test]
    async fn sync_preserves_global_roles_and_legacy_claim() {
        let provider = FakeProvider::with_users(&["u1"]);
        provider.make_super_admin_with_legacy("u1", "legacy-t");
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap();
        let claims = provider.claims_of(&u1);
        assert!(claims.is_super_admin());
        assert_eq!(claims.legacy_tenant_id.as_ref().map(TenantId::as_str), Some("legacy-t"));
        assert_eq!(claims.tenant_memberships.len(), 1);
    }

    #[tokio::test]
    async fn failed_sync_surfaces_backend_unavailable_after_commit() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        provider.fail_claim_writes(true);
        let err = svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap_err();
        assert_eq!(err.code(), "backend_unavailable");
        assert!(svc.find_active(&u1, &t1).await.unwrap().is_some());

        provider.fail_claim_writes(false);
        svc.sync_claims(&u1).await.unwrap();
        assert!(provider.claims_of(&u1).membership_for(&t1).is_some());
    }

    #[tokio::test]
    async fn set_roles_on_missing_membership_is_invalid() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider);
        let (t1, u1, _) = ids();
        let err = svc.set_roles(&t1, &u1, roles(&[TenantRole::Admin])).await.unwrap_err();
        assert_eq!(err.code(), "invalid_request");
    }

    #[tokio::test]
    async fn purge_tenant_clears_rows_and_claims() {
        let provider = FakeProvider::with_users(&["u1"]);
        let svc = service(provider.clone());
        let (t1, u1, admin) = ids();

        svc.grant(&t1, &u1, roles(&[TenantRole::User]), &admin).await.unwrap();
        let members = svc.list_for_tenant(&t1).await.unwrap();
        assert_eq!(svc.purge_tenant(&t1, members).await.unwrap(), 1);
        assert!(svc.list_for_tenant(&t1).await.unwrap().is_empty());
        assert!(provider.claims_of(&u1).membership_for(&t1).is_none());
    }
}
