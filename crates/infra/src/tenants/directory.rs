//! Relational tenant directory: the `tenants` table and its in-memory twin.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use warden_core::{AuthError, AuthResult, TenantId};
use warden_identity::{SignInOptions, Tenant, TenantDirectory};

use crate::db::map_sqlx_error;

/// In-memory directory (tests / dev without a database).
#[derive(Debug, Default)]
pub struct InMemoryTenantDirectory {
    rows: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn insert(&self, tenant: &Tenant) -> AuthResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        if rows.contains_key(&tenant.tenant_id) {
            return Err(AuthError::already_exists(format!("tenant {}", tenant.tenant_id)));
        }
        if rows.values().any(|t| t.subdomain == tenant.subdomain) {
            return Err(AuthError::already_exists(format!("subdomain {}", tenant.subdomain)));
        }
        rows.insert(tenant.tenant_id.clone(), tenant.clone());
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> AuthResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        if rows
            .values()
            .any(|t| t.subdomain == tenant.subdomain && t.tenant_id != tenant.tenant_id)
        {
            return Err(AuthError::already_exists(format!("subdomain {}", tenant.subdomain)));
        }
        match rows.get_mut(&tenant.tenant_id) {
            Some(row) => {
                *row = tenant.clone();
                Ok(())
            }
            None => Err(AuthError::TenantNotFound),
        }
    }

    async fn delete(&self, tenant_id: &TenantId) -> AuthResult<()> {
        let mut rows = self.rows.write().unwrap_or_else(PoisonError::into_inner);
        rows.remove(tenant_id).map(|_| ()).ok_or(AuthError::TenantNotFound)
    }

    async fn get(&self, tenant_id: &TenantId) -> AuthResult<Option<Tenant>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.get(tenant_id).cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> AuthResult<Option<Tenant>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        Ok(rows.values().find(|t| t.subdomain == subdomain).cloned())
    }

    async fn list(&self) -> AuthResult<Vec<Tenant>> {
        let rows = self.rows.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Tenant> = rows.values().cloned().collect();
        out.sort_by(|a, b| a.subdomain.cmp(&b.subdomain));
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres
// ─────────────────────────────────────────────────────────────────────────────

/// Postgres-backed directory over the `tenants` table.
///
/// `subdomain` carries a unique constraint; a clash surfaces as
/// `AlreadyExists`.
#[derive(Debug, Clone)]
pub struct PostgresTenantDirectory {
    pool: Arc<PgPool>,
}

impl PostgresTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

struct TenantRow {
    tenant_id: String,
    subdomain: String,
    display_name: String,
    allow_password_sign_up: bool,
    enable_email_link_sign_in: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for TenantRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(TenantRow {
            tenant_id: row.try_get("tenant_id")?,
            subdomain: row.try_get("subdomain")?,
            display_name: row.try_get("display_name")?,
            allow_password_sign_up: row.try_get("allow_password_sign_up")?,
            enable_email_link_sign_in: row.try_get("enable_email_link_sign_in")?,
        })
    }
}

impl TryFrom<TenantRow> for Tenant {
    type Error = AuthError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        Ok(Tenant {
            tenant_id: TenantId::new(row.tenant_id)?,
            subdomain: row.subdomain,
            display_name: row.display_name,
            sign_in_options: SignInOptions {
                allow_password_sign_up: row.allow_password_sign_up,
                enable_email_link_sign_in: row.enable_email_link_sign_in,
            },
        })
    }
}

fn decode(row: &PgRow) -> AuthResult<Tenant> {
    use sqlx::FromRow;
    let row = TenantRow::from_row(row).map_err(|e| AuthError::store(format!("failed to decode tenant row: {e}")))?;
    Tenant::try_from(row)
}

const SELECT_TENANT: &str = r#"
    SELECT tenant_id, subdomain, display_name, allow_password_sign_up, enable_email_link_sign_in
    FROM tenants
"#;

#[async_trait]
impl TenantDirectory for PostgresTenantDirectory {
    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id, subdomain = %tenant.subdomain), err)]
    async fn insert(&self, tenant: &Tenant) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (tenant_id, subdomain, display_name, allow_password_sign_up, enable_email_link_sign_in)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tenant.tenant_id.as_str())
        .bind(&tenant.subdomain)
        .bind(&tenant.display_name)
        .bind(tenant.sign_in_options.allow_password_sign_up)
        .bind(tenant.sign_in_options.enable_email_link_sign_in)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tenant", e))?;
        Ok(())
    }

    #[instrument(skip(self, tenant), fields(tenant_id = %tenant.tenant_id), err)]
    async fn update(&self, tenant: &Tenant) -> AuthResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET subdomain = $2,
                display_name = $3,
                allow_password_sign_up = $4,
                enable_email_link_sign_in = $5,
                updated_at = NOW()
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.tenant_id.as_str())
        .bind(&tenant.subdomain)
        .bind(&tenant.display_name)
        .bind(tenant.sign_in_options.allow_password_sign_up)
        .bind(tenant.sign_in_options.enable_email_link_sign_in)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_tenant", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::TenantNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn delete(&self, tenant_id: &TenantId) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM tenants WHERE tenant_id = $1")
            .bind(tenant_id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_tenant", e))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::TenantNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    async fn get(&self, tenant_id: &TenantId) -> AuthResult<Option<Tenant>> {
        let row = sqlx::query(&format!("{SELECT_TENANT} WHERE tenant_id = $1"))
            .bind(tenant_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_tenant", e))?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_by_subdomain(&self, subdomain: &str) -> AuthResult<Option<Tenant>> {
        let row = sqlx::query(&format!("{SELECT_TENANT} WHERE subdomain = $1"))
            .bind(subdomain)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_tenant_by_subdomain", e))?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> AuthResult<Vec<Tenant>> {
        let rows = sqlx::query(&format!("{SELECT_TENANT} ORDER BY subdomain ASC"))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tenants", e))?;
        rows.iter().map(decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(id: &str, subdomain: &str) -> Tenant {
        Tenant {
            tenant_id: TenantId::new(id).unwrap(),
            subdomain: subdomain.to_string(),
            display_name: id.to_uppercase(),
            sign_in_options: SignInOptions::default(),
        }
    }

    #[tokio::test]
    async fn subdomain_is_unique() {
        let dir = InMemoryTenantDirectory::new();
        dir.insert(&tenant("t1", "acme")).await.unwrap();

        let err = dir.insert(&tenant("t2", "acme")).await.unwrap_err();
        assert_eq!(err.code(), "already_exists");

        dir.insert(&tenant("t2", "globex")).await.unwrap();
        let err = dir.update(&tenant("t2", "acme")).await.unwrap_err();
        assert_eq!(err.code(), "already_exists");
    }

    #[tokio::test]
    async fn lookup_by_subdomain_and_delete() {
        let dir = InMemoryTenantDirectory::new();
        dir.insert(&tenant("t1", "acme")).await.unwrap();

        let found = dir.find_by_subdomain("acme").await.unwrap().unwrap();
        assert_eq!(found.tenant_id.as_str(), "t1");
        assert!(dir.find_by_subdomain("nope").await.unwrap().is_none());

        dir.delete(&found.tenant_id).await.unwrap();
        assert_eq!(dir.delete(&found.tenant_id).await.unwrap_err(), AuthError::TenantNotFound);
        assert!(dir.list().await.unwrap().is_empty());
    }
}
