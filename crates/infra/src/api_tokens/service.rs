//! API token service: long-lived service-to-service credentials, independent
//! of the identity provider.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::instrument;

use warden_core::{AuthError, AuthResult, ClientApplicationId, TokenId, UserId};

use super::secret;
use super::store::ApiTokenStore;
use super::types::{ApiToken, ClientApplication, IssueTokenRequest, IssuedToken, TokenAuditAction, TokenAuditEntry};

pub const DEFAULT_TTL_DAYS: i64 = 90;
pub const MAX_TTL_DAYS: i64 = 365;

/// `None` → default; anything else clamped into `[1, MAX_TTL_DAYS]`.
pub fn clamp_ttl_days(requested: Option<i64>) -> i64 {
    requested.unwrap_or(DEFAULT_TTL_DAYS).clamp(1, MAX_TTL_DAYS)
}

pub struct ApiTokenService {
    store: Arc<dyn ApiTokenStore>,
}

impl ApiTokenService {
    pub fn new(store: Arc<dyn ApiTokenStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self), fields(created_by = %created_by), err)]
    pub async fn register_application(&self, name: &str, created_by: &UserId) -> AuthResult<ClientApplication> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::invalid("application name must not be empty"));
        }
        let app = ClientApplication {
            id: ClientApplicationId::new(),
            name: name.to_string(),
            created_by: created_by.clone(),
            created_at: Utc::now(),
        };
        self.store.insert_application(&app).await?;
        tracing::info!(target: "audit", app_id = %app.id, created_by = %created_by, "client application registered");
        Ok(app)
    }

    pub async fn list_applications(&self) -> AuthResult<Vec<ClientApplication>> {
        self.store.list_applications().await
    }

    /// Mint a token. The returned plaintext is not retrievable again.
    #[instrument(skip(self, request), fields(app_id = %app_id, created_by = %created_by), err)]
    pub async fn issue(
        &self,
        app_id: ClientApplicationId,
        request: IssueTokenRequest,
        created_by: &UserId,
    ) -> AuthResult<IssuedToken> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::invalid("token name must not be empty"));
        }
        let scopes: BTreeSet<String> = request
            .scopes
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let ttl_days = clamp_ttl_days(request.ttl_days);
        let plaintext = secret::generate();
        let now = Utc::now();
        let token = ApiToken {
            id: TokenId::new(),
            client_application_id: app_id,
            name: name.to_string(),
            token_hash: secret::hash(&plaintext),
            token_prefix: secret::display_prefix(&plaintext),
            scopes,
            expires_at: now + Duration::days(ttl_days),
            revoked: false,
            revoked_reason: None,
            revoked_at: None,
            revoked_by: None,
            created_by: created_by.clone(),
            created_at: now,
            last_used_at: None,
        };
        self.store.insert_token(&token).await?;

        tracing::info!(
            target: "audit",
            token_id = %token.id,
            app_id = %app_id,
            prefix = %token.token_prefix,
            ttl_days,
            "api token issued"
        );
        self.audit(TokenAuditEntry::new(
            token.id,
            TokenAuditAction::Issued,
            Some(created_by.clone()),
            Some(format!("ttl_days={ttl_days}")),
        ))
        .await;

        Ok(IssuedToken { plaintext, token })
    }

    /// Authenticate a presented token. Fails closed: anything but a live,
    /// unrevoked, unexpired match is `Forbidden`.
    #[instrument(skip(self, plaintext), err)]
    pub async fn verify(&self, plaintext: &str) -> AuthResult<ApiToken> {
        let candidate = plaintext.trim();
        if !secret::looks_like_token(candidate) {
            return Err(AuthError::forbidden("invalid api token"));
        }
        let Some(mut token) = self.store.find_by_hash(&secret::hash(candidate)).await? else {
            return Err(AuthError::forbidden("invalid api token"));
        };

        let now = Utc::now();
        if token.revoked {
            tracing::info!(target: "audit", token_id = %token.id, "revoked api token presented");
            return Err(AuthError::forbidden("api token revoked"));
        }
        if token.is_expired(now) {
            return Err(AuthError::forbidden("api token expired"));
        }

        if let Err(err) = self.store.touch_last_used(token.id, now).await {
            tracing::warn!(token_id = %token.id, error = %err, "failed to record api token use");
        } else {
            token.last_used_at = Some(now);
        }
        self.audit(TokenAuditEntry::new(token.id, TokenAuditAction::Used, None, None))
            .await;
        Ok(token)
    }

    /// Revoke a token. Revoking twice reports `Conflict`.
    #[instrument(skip(self, reason), fields(token_id = %id, revoked_by = %by), err)]
    pub async fn revoke(&self, id: TokenId, reason: &str, by: &UserId) -> AuthResult<ApiToken> {
        let reason = reason.trim();
        let reason = if reason.is_empty() { "unspecified" } else { reason };
        let token = self.store.revoke(id, reason, by, Utc::now()).await?;

        tracing::info!(target: "audit", token_id = %id, revoked_by = %by, reason, "api token revoked");
        self.audit(TokenAuditEntry::new(
            id,
            TokenAuditAction::Revoked,
            Some(by.clone()),
            Some(reason.to_string()),
        ))
        .await;
        Ok(token)
    }

    pub async fn get(&self, id: TokenId) -> AuthResult<ApiToken> {
        self.store.get_token(id).await?.ok_or(AuthError::TokenNotFound)
    }

    pub async fn list_for_application(&self, app_id: ClientApplicationId) -> AuthResult<Vec<ApiToken>> {
        if self.store.get_application(app_id).await?.is_none() {
            return Err(AuthError::invalid("unknown client application"));
        }
        self.store.list_for_application(app_id).await
    }

    pub async fn audit_log(&self, id: TokenId) -> AuthResult<Vec<TokenAuditEntry>> {
        if self.store.get_token(id).await?.is_none() {
            return Err(AuthError::TokenNotFound);
        }
        self.store.audit_log(id).await
    }

    async fn audit(&self, entry: TokenAuditEntry) {
        if let Err(err) = self.store.append_audit(&entry).await {
            tracing::warn!(
                token_id = %entry.token_id,
                action = entry.action.as_str(),
                error = %err,
                "api token audit write failed"
            );
        }
    }
}
