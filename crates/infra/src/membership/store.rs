//! Membership persistence: `user × tenant → roles, status`.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use warden_auth::{TenantMembership, TenantRole};
use warden_core::{AuthError, AuthResult, TenantId, UserId};

use crate::db::map_sqlx_error;

/// Lifecycle of a membership. Only `Active` grants access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Invited,
    Suspended,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Invited => "invited",
            MembershipStatus::Suspended => "suspended",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "invited" => Ok(MembershipStatus::Invited),
            "suspended" => Ok(MembershipStatus::Suspended),
            other => Err(AuthError::invalid(format!("unknown membership status '{other}'"))),
        }
    }
}

/// One row of the membership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipRecord {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub roles: BTreeSet<TenantRole>,
    pub status: MembershipStatus,
    pub invited_by: Option<UserId>,
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipRecord {
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    /// The claim-shaped projection of this row.
    pub fn to_membership(&self) -> TenantMembership {
        TenantMembership::new(self.tenant_id.clone(), self.roles.iter().copied())
    }
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Insert or replace the row for `(user_id, tenant_id)`.
    async fn upsert(&self, record: &MembershipRecord) -> AuthResult<()>;

    async fn get(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<Option<MembershipRecord>>;

    /// Returns whether a row was removed.
    async fn delete(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<bool>;

    async fn list_for_user(&self, user_id: &UserId) -> AuthResult<Vec<MembershipRecord>>;

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>>;

    /// Remove every row of a tenant; returns the removed rows.
    async fn delete_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryMembershipStore {
    rows: RwLock<BTreeMap<(UserId, TenantId), MembershipRecord>>,
}

impl InMemoryMembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl MembershipStore for InMemoryMembershipStore {
    async fn upsert(&self, record: &MembershipRecord) -> AuthResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.insert((record.user_id.clone(), record.tenant_id.clone()), record.clone());
        Ok(())
    }

    async fn get(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<Option<MembershipRecord>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(&(user_id.clone(), tenant_id.clone())).cloned())
    }

    async fn delete(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<bool> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.remove(&(user_id.clone(), tenant_id.clone())).is_some())
    }

    async fn list_for_user(&self, user_id: &UserId) -> AuthResult<Vec<MembershipRecord>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.values().filter(|r| &r.user_id == user_id).cloned().collect())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.values().filter(|r| &r.tenant_id == tenant_id).cloned().collect())
    }

    async fn delete_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = Vec::new();
        rows.retain(|_, r| {
            if &r.tenant_id == tenant_id {
                removed.push(r.clone());
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresMembershipStore {
    pool: Arc<PgPool>,
}

impl PostgresMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

struct MembershipRow {
    user_id: String,
    tenant_id: String,
    roles: Vec<String>,
    status: String,
    invited_by: Option<String>,
    joined_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for MembershipRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MembershipRow {
            user_id: row.try_get("user_id")?,
            tenant_id: row.try_get("tenant_id")?,
            roles: row.try_get("roles")?,
            status: row.try_get("status")?,
            invited_by: row.try_get("invited_by")?,
            joined_at: row.try_get("joined_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<MembershipRow> for MembershipRecord {
    type Error = AuthError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let mut roles = BTreeSet::new();
        for raw in &row.roles {
            match raw.parse::<TenantRole>() {
                Ok(role) => {
                    roles.insert(role);
                }
                Err(_) => tracing::warn!(role = %raw, user_id = %row.user_id, "ignoring unknown role in membership row"),
            }
        }
        Ok(MembershipRecord {
            user_id: UserId::new(row.user_id)?,
            tenant_id: TenantId::new(row.tenant_id)?,
            roles,
            status: row.status.parse()?,
            invited_by: row.invited_by.map(UserId::new).transpose()?,
            joined_at: row.joined_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode(row: &PgRow) -> AuthResult<MembershipRecord> {
    use sqlx::FromRow;
    let row = MembershipRow::from_row(row)
        .map_err(|e| AuthError::store(format!("failed to decode membership row: {e}")))?;
    MembershipRecord::try_from(row)
}

const SELECT_MEMBERSHIP: &str = r#"
    SELECT user_id, tenant_id, roles, status, invited_by, joined_at, created_at, updated_at
    FROM tenant_memberships
"#;

#[async_trait]
impl MembershipStore for PostgresMembershipStore {
    #[instrument(
        skip(self, record),
        fields(user_id = %record.user_id, tenant_id = %record.tenant_id, status = record.status.as_str()),
        err
    )]
    async fn upsert(&self, record: &MembershipRecord) -> AuthResult<()> {
        let roles: Vec<String> = record.roles.iter().map(|r| r.as_str().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO tenant_memberships
                (user_id, tenant_id, roles, status, invited_by, joined_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, tenant_id) DO UPDATE
            SET roles = EXCLUDED.roles,
                status = EXCLUDED.status,
                invited_by = EXCLUDED.invited_by,
                joined_at = EXCLUDED.joined_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.user_id.as_str())
        .bind(record.tenant_id.as_str())
        .bind(&roles)
        .bind(record.status.as_str())
        .bind(record.invited_by.as_ref().map(UserId::as_str))
        .bind(record.joined_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_membership", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, tenant_id = %tenant_id), err)]
    async fn get(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<Option<MembershipRecord>> {
        let row = sqlx::query(&format!("{SELECT_MEMBERSHIP} WHERE user_id = $1 AND tenant_id = $2"))
            .bind(user_id.as_str())
            .bind(tenant_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_membership", e))?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id, tenant_id = %tenant_id), err)]
    async fn delete(&self, user_id: &UserId, tenant_id: &TenantId) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM tenant_memberships WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id.as_str())
            .bind(tenant_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_membership", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn list_for_user(&self, user_id: &UserId) -> AuthResult<Vec<MembershipRecord>> {
        let rows = sqlx::query(&format!("{SELECT_MEMBERSHIP} WHERE user_id = $1 ORDER BY tenant_id ASC"))
            .bind(user_id.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_memberships_for_user", e))?;
        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>> {
        let rows = sqlx::query(&format!("{SELECT_MEMBERSHIP} WHERE tenant_id = $1 ORDER BY user_id ASC"))
            .bind(tenant_id.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_memberships_for_tenant", e))?;
        rows.iter().map(decode).collect()
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete_for_tenant(&self, tenant_id: &TenantId) -> AuthResult<Vec<MembershipRecord>> {
        let rows = sqlx::query(
            r#"
            DELETE FROM tenant_memberships
            WHERE tenant_id = $1
            RETURNING user_id, tenant_id, roles, status, invited_by, joined_at, created_at, updated_at
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_memberships_for_tenant", e))?;
        rows.iter().map(decode).collect()
    }
}
