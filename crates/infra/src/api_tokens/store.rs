//! API token persistence.
//!
//! Issue and revoke each run in one transaction. Audit rows are written
//! separately so a failing audit insert never rolls back the primary change.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use warden_core::{AuthError, AuthResult, ClientApplicationId, TokenId, UserId};

use crate::db::map_sqlx_error;

use super::types::{ApiToken, ClientApplication, TokenAuditEntry};

#[async_trait]
pub trait ApiTokenStore: Send + Sync {
    async fn insert_application(&self, app: &ClientApplication) -> AuthResult<()>;

    async fn get_application(&self, id: ClientApplicationId) -> AuthResult<Option<ClientApplication>>;

    async fn list_applications(&self) -> AuthResult<Vec<ClientApplication>>;

    /// Persist a new token. Fails with `Invalid` if its application does not
    /// exist and `AlreadyExists` on a hash clash.
    async fn insert_token(&self, token: &ApiToken) -> AuthResult<()>;

    async fn get_token(&self, id: TokenId) -> AuthResult<Option<ApiToken>>;

    /// The only lookup used to authorize a presented token.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<ApiToken>>;

    async fn touch_last_used(&self, id: TokenId, at: DateTime<Utc>) -> AuthResult<()>;

    /// Mark a token revoked. `TokenNotFound` if absent, `Conflict` if it was
    /// already revoked.
    async fn revoke(&self, id: TokenId, reason: &str, by: &UserId, at: DateTime<Utc>) -> AuthResult<ApiToken>;

    async fn list_for_application(&self, app_id: ClientApplicationId) -> AuthResult<Vec<ApiToken>>;

    async fn append_audit(&self, entry: &TokenAuditEntry) -> AuthResult<()>;

    async fn audit_log(&self, token_id: TokenId) -> AuthResult<Vec<TokenAuditEntry>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    applications: HashMap<ClientApplicationId, ClientApplication>,
    tokens: HashMap<TokenId, ApiToken>,
    by_hash: HashMap<String, TokenId>,
    audit: Vec<TokenAuditEntry>,
}

/// In-memory token store. A single lock covers all tables, so each call is
/// atomic.
#[derive(Debug, Default)]
pub struct InMemoryApiTokenStore {
    tables: RwLock<Tables>,
    fail_audit: AtomicBool,
}

impl InMemoryApiTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every audit append fail (exercises the best-effort path).
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ApiTokenStore for InMemoryApiTokenStore {
    async fn insert_application(&self, app: &ClientApplication) -> AuthResult<()> {
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if t.applications.contains_key(&app.id) {
            return Err(AuthError::already_exists(format!("client application {}", app.id)));
        }
        t.applications.insert(app.id, app.clone());
        Ok(())
    }

    async fn get_application(&self, id: ClientApplicationId) -> AuthResult<Option<ClientApplication>> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(t.applications.get(&id).cloned())
    }

    async fn list_applications(&self) -> AuthResult<Vec<ClientApplication>> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut apps: Vec<_> = t.applications.values().cloned().collect();
        apps.sort_by_key(|a| a.created_at);
        Ok(apps)
    }

    async fn insert_token(&self, token: &ApiToken) -> AuthResult<()> {
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !t.applications.contains_key(&token.client_application_id) {
            return Err(AuthError::invalid("unknown client application"));
        }
        if t.by_hash.contains_key(&token.token_hash) || t.tokens.contains_key(&token.id) {
            return Err(AuthError::already_exists("api token"));
        }
        t.by_hash.insert(token.token_hash.clone(), token.id);
        t.tokens.insert(token.id, token.clone());
        Ok(())
    }

    async fn get_token(&self, id: TokenId) -> AuthResult<Option<ApiToken>> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(t.tokens.get(&id).cloned())
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<ApiToken>> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(t.by_hash.get(token_hash).and_then(|id| t.tokens.get(id)).cloned())
    }

    async fn touch_last_used(&self, id: TokenId, at: DateTime<Utc>) -> AuthResult<()> {
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let token = t.tokens.get_mut(&id).ok_or(AuthError::TokenNotFound)?;
        token.last_used_at = Some(at);
        Ok(())
    }

    async fn revoke(&self, id: TokenId, reason: &str, by: &UserId, at: DateTime<Utc>) -> AuthResult<ApiToken> {
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let token = t.tokens.get_mut(&id).ok_or(AuthError::TokenNotFound)?;
        if token.revoked {
            return Err(AuthError::conflict("api token already revoked"));
        }
        token.revoked = true;
        token.revoked_reason = Some(reason.to_string());
        token.revoked_at = Some(at);
        token.revoked_by = Some(by.clone());
        Ok(token.clone())
    }

    async fn list_for_application(&self, app_id: ClientApplicationId) -> AuthResult<Vec<ApiToken>> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut tokens: Vec<_> = t
            .tokens
            .values()
            .filter(|tok| tok.client_application_id == app_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|tok| tok.created_at);
        Ok(tokens)
    }

    async fn append_audit(&self, entry: &TokenAuditEntry) -> AuthResult<()> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AuthError::store("audit table unavailable"));
        }
        let mut t = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        t.audit.push(entry.clone());
        Ok(())
    }

    async fn audit_log(&self, token_id: TokenId) -> AuthResult<Vec<TokenAuditEntry>> {
        let t = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(t.audit.iter().filter(|e| e.token_id == token_id).cloned().collect())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PostgresApiTokenStore {
    pool: Arc<PgPool>,
}

impl PostgresApiTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }
}

struct ApiTokenRow {
    id: Uuid,
    client_application_id: Uuid,
    name: String,
    token_hash: String,
    token_prefix: String,
    scopes: Vec<String>,
    expires_at: DateTime<Utc>,
    revoked: bool,
    revoked_reason: Option<String>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ApiTokenRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ApiTokenRow {
            id: row.try_get("id")?,
            client_application_id: row.try_get("client_application_id")?,
            name: row.try_get("name")?,
            token_hash: row.try_get("token_hash")?,
            token_prefix: row.try_get("token_prefix")?,
            scopes: row.try_get("scopes")?,
            expires_at: row.try_get("expires_at")?,
            revoked: row.try_get("revoked")?,
            revoked_reason: row.try_get("revoked_reason")?,
            revoked_at: row.try_get("revoked_at")?,
            revoked_by: row.try_get("revoked_by")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}

impl TryFrom<ApiTokenRow> for ApiToken {
    type Error = AuthError;

    fn try_from(row: ApiTokenRow) -> Result<Self, Self::Error> {
        Ok(ApiToken {
            id: TokenId::from_uuid(row.id),
            client_application_id: ClientApplicationId::from_uuid(row.client_application_id),
            name: row.name,
            token_hash: row.token_hash,
            token_prefix: row.token_prefix,
            scopes: row.scopes.into_iter().collect::<BTreeSet<_>>(),
            expires_at: row.expires_at,
            revoked: row.revoked,
            revoked_reason: row.revoked_reason,
            revoked_at: row.revoked_at,
            revoked_by: row.revoked_by.map(UserId::new).transpose()?,
            created_by: UserId::new(row.created_by)?,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        })
    }
}

fn decode_token(row: &PgRow) -> AuthResult<ApiToken> {
    use sqlx::FromRow;
    let row = ApiTokenRow::from_row(row).map_err(|e| AuthError::store(format!("failed to decode api token row: {e}")))?;
    ApiToken::try_from(row)
}

fn decode_application(row: &PgRow) -> AuthResult<ClientApplication> {
    let read = || -> Result<(Uuid, String, String, DateTime<Utc>), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            row.try_get("name")?,
            row.try_get("created_by")?,
            row.try_get("created_at")?,
        ))
    };
    let (id, name, created_by, created_at) =
        read().map_err(|e| AuthError::store(format!("failed to decode client application row: {e}")))?;
    Ok(ClientApplication {
        id: ClientApplicationId::from_uuid(id),
        name,
        created_by: UserId::new(created_by)?,
        created_at,
    })
}

fn decode_audit(row: &PgRow) -> AuthResult<TokenAuditEntry> {
    let read = || -> Result<(Uuid, Uuid, String, Option<String>, Option<String>, DateTime<Utc>), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            row.try_get("token_id")?,
            row.try_get("action")?,
            row.try_get("actor")?,
            row.try_get("detail")?,
            row.try_get("occurred_at")?,
        ))
    };
    let (id, token_id, action, actor, detail, occurred_at) =
        read().map_err(|e| AuthError::store(format!("failed to decode audit row: {e}")))?;
    Ok(TokenAuditEntry {
        id,
        token_id: TokenId::from_uuid(token_id),
        action: action.parse()?,
        actor: actor.map(UserId::new).transpose()?,
        detail,
        occurred_at,
    })
}

const SELECT_TOKEN: &str = r#"
    SELECT id, client_application_id, name, token_hash, token_prefix, scopes, expires_at,
           revoked, revoked_reason, revoked_at, revoked_by, created_by, created_at, last_used_at
    FROM api_tokens
"#;

#[async_trait]
impl ApiTokenStore for PostgresApiTokenStore {
    #[instrument(skip(self, app), fields(app_id = %app.id), err)]
    async fn insert_application(&self, app: &ClientApplication) -> AuthResult<()> {
        sqlx::query("INSERT INTO client_applications (id, name, created_by, created_at) VALUES ($1, $2, $3, $4)")
            .bind(app.id.as_uuid())
            .bind(&app.name)
            .bind(app.created_by.as_str())
            .bind(app.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_client_application", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(app_id = %id), err)]
    async fn get_application(&self, id: ClientApplicationId) -> AuthResult<Option<ClientApplication>> {
        let row = sqlx::query("SELECT id, name, created_by, created_at FROM client_applications WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_client_application", e))?;
        row.as_ref().map(decode_application).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_applications(&self) -> AuthResult<Vec<ClientApplication>> {
        let rows = sqlx::query("SELECT id, name, created_by, created_at FROM client_applications ORDER BY created_at ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_client_applications", e))?;
        rows.iter().map(decode_application).collect()
    }

    #[instrument(skip(self, token), fields(token_id = %token.id, app_id = %token.client_application_id), err)]
    async fn insert_token(&self, token: &ApiToken) -> AuthResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let app = sqlx::query("SELECT id FROM client_applications WHERE id = $1 FOR SHARE")
            .bind(token.client_application_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_client_application", e))?;
        if app.is_none() {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(AuthError::invalid("unknown client application"));
        }

        let scopes: Vec<String> = token.scopes.iter().cloned().collect();
        sqlx::query(
            r#"
            INSERT INTO api_tokens
                (id, client_application_id, name, token_hash, token_prefix, scopes, expires_at,
                 revoked, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, $8, $9)
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(token.client_application_id.as_uuid())
        .bind(&token.name)
        .bind(&token.token_hash)
        .bind(&token.token_prefix)
        .bind(&scopes)
        .bind(token.expires_at)
        .bind(token.created_by.as_str())
        .bind(token.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_api_token", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(token_id = %id), err)]
    async fn get_token(&self, id: TokenId) -> AuthResult<Option<ApiToken>> {
        let row = sqlx::query(&format!("{SELECT_TOKEN} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_api_token", e))?;
        row.as_ref().map(decode_token).transpose()
    }

    #[instrument(skip(self, token_hash), err)]
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<ApiToken>> {
        let row = sqlx::query(&format!("{SELECT_TOKEN} WHERE token_hash = $1"))
            .bind(token_hash)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_api_token_by_hash", e))?;
        row.as_ref().map(decode_token).transpose()
    }

    #[instrument(skip(self), fields(token_id = %id), err)]
    async fn touch_last_used(&self, id: TokenId, at: DateTime<Utc>) -> AuthResult<()> {
        let result = sqlx::query("UPDATE api_tokens SET last_used_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("touch_api_token", e))?;
        if result.rows_affected() == 0 {
            return Err(AuthError::TokenNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self, reason), fields(token_id = %id, revoked_by = %by), err)]
    async fn revoke(&self, id: TokenId, reason: &str, by: &UserId, at: DateTime<Utc>) -> AuthResult<ApiToken> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = sqlx::query(&format!("{SELECT_TOKEN} WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_api_token", e))?;
        let mut token = match current.as_ref().map(decode_token).transpose()? {
            Some(token) => token,
            None => {
                tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(AuthError::TokenNotFound);
            }
        };
        if token.revoked {
            tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(AuthError::conflict("api token already revoked"));
        }

        sqlx::query(
            r#"
            UPDATE api_tokens
            SET revoked = TRUE, revoked_reason = $2, revoked_at = $3, revoked_by = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(reason)
        .bind(at)
        .bind(by.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("revoke_api_token", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        token.revoked = true;
        token.revoked_reason = Some(reason.to_string());
        token.revoked_at = Some(at);
        token.revoked_by = Some(by.clone());
        Ok(token)
    }

    #[instrument(skip(self), fields(app_id = %app_id), err)]
    async fn list_for_application(&self, app_id: ClientApplicationId) -> AuthResult<Vec<ApiToken>> {
        let rows = sqlx::query(&format!("{SELECT_TOKEN} WHERE client_application_id = $1 ORDER BY created_at ASC"))
            .bind(app_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_api_tokens", e))?;
        rows.iter().map(decode_token).collect()
    }

    #[instrument(skip(self, entry), fields(token_id = %entry.token_id, action = entry.action.as_str()), err)]
    async fn append_audit(&self, entry: &TokenAuditEntry) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO api_token_audit_log (id, token_id, action, actor, detail, occurred_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(entry.token_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.actor.as_ref().map(UserId::as_str))
        .bind(entry.detail.as_deref())
        .bind(entry.occurred_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_api_token_audit", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(token_id = %token_id), err)]
    async fn audit_log(&self, token_id: TokenId) -> AuthResult<Vec<TokenAuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, token_id, action, actor, detail, occurred_at
            FROM api_token_audit_log
            WHERE token_id = $1
            ORDER BY occurred_at ASC, id ASC
            "#,
        )
        .bind(token_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_api_token_audit", e))?;
        rows.iter().map(decode_audit).collect()
    }
}
