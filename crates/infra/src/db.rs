//! Postgres connection and schema bootstrap.
//!
//! The tables owned by this layer are created idempotently at start-up. Each
//! statement runs on its own so a partially bootstrapped database converges on
//! the next boot.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::instrument;

use warden_core::AuthError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tenants (
        tenant_id TEXT PRIMARY KEY,
        subdomain TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        allow_password_sign_up BOOLEAN NOT NULL DEFAULT TRUE,
        enable_email_link_sign_in BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tenant_memberships (
        user_id TEXT NOT NULL,
        tenant_id TEXT NOT NULL REFERENCES tenants (tenant_id) ON DELETE CASCADE,
        roles TEXT[] NOT NULL,
        status TEXT NOT NULL,
        invited_by TEXT,
        joined_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (user_id, tenant_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS tenant_memberships_tenant_idx ON tenant_memberships (tenant_id)",
    r#"
    CREATE TABLE IF NOT EXISTS client_applications (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        created_by TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS api_tokens (
        id UUID PRIMARY KEY,
        client_application_id UUID NOT NULL REFERENCES client_applications (id),
        name TEXT NOT NULL,
        token_hash TEXT NOT NULL UNIQUE,
        token_prefix TEXT NOT NULL,
        scopes TEXT[] NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE,
        revoked_reason TEXT,
        revoked_at TIMESTAMPTZ,
        revoked_by TEXT,
        created_by TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        last_used_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS api_tokens_application_idx ON api_tokens (client_application_id)",
    r#"
    CREATE TABLE IF NOT EXISTS api_token_audit_log (
        id UUID PRIMARY KEY,
        token_id UUID NOT NULL,
        action TEXT NOT NULL,
        actor TEXT,
        detail TEXT,
        occurred_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS api_token_audit_log_token_idx ON api_token_audit_log (token_id, occurred_at)",
];

/// Open a pool and make sure the schema exists.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    bootstrap_schema(&pool).await?;
    Ok(pool)
}

#[instrument(skip(pool), err)]
pub async fn bootstrap_schema(pool: &PgPool) -> Result<(), AuthError> {
    for statement in SCHEMA {
        sqlx::query(*statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("bootstrap_schema", e))?;
    }
    tracing::info!(statements = SCHEMA.len(), "schema ready");
    Ok(())
}

/// Convert a sqlx error into the workspace taxonomy.
///
/// | sqlx error | code | AuthError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `AlreadyExists` |
/// | Database (foreign key violation) | `23503` | `Invalid` |
/// | Database (other) | any | `Store` |
/// | PoolClosed / RowNotFound / other | n/a | `Store` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> AuthError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => AuthError::already_exists(format!("duplicate key in {operation}")),
                Some("23503") => AuthError::invalid(format!("dangling reference in {operation}")),
                _ => AuthError::store(msg),
            }
        }
        sqlx::Error::PoolClosed => AuthError::store(format!("connection pool closed in {}", operation)),
        sqlx::Error::RowNotFound => AuthError::store(format!("unexpected row not found in {}", operation)),
        _ => AuthError::store(format!("sqlx error in {}: {}", operation, err)),
    }
}
