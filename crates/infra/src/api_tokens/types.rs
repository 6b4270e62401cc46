//! API token records and their audit trail.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use warden_core::{AuthError, ClientApplicationId, TokenId, UserId};

/// Owner of a set of API tokens (a service integrating with the platform).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientApplication {
    pub id: ClientApplicationId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Stored API token. The plaintext is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiToken {
    pub id: TokenId,
    pub client_application_id: ClientApplicationId,
    pub name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    /// Display-only; never used to authorize.
    pub token_prefix: String,
    pub scopes: BTreeSet<String>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_reason: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<UserId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

/// A freshly issued token: the only place the plaintext ever appears.
#[derive(Clone)]
pub struct IssuedToken {
    pub plaintext: String,
    pub token: ApiToken,
}

impl core::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"<redacted>")
            .field("token", &self.token)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueTokenRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// Clamped into `[1, MAX_TTL_DAYS]`; defaults to `DEFAULT_TTL_DAYS`.
    #[serde(default)]
    pub ttl_days: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenAuditAction {
    Issued,
    Used,
    Revoked,
}

impl TokenAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenAuditAction::Issued => "issued",
            TokenAuditAction::Used => "used",
            TokenAuditAction::Revoked => "revoked",
        }
    }
}

impl FromStr for TokenAuditAction {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(TokenAuditAction::Issued),
            "used" => Ok(TokenAuditAction::Used),
            "revoked" => Ok(TokenAuditAction::Revoked),
            other => Err(AuthError::invalid(format!("unknown audit action '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenAuditEntry {
    pub id: Uuid,
    pub token_id: TokenId,
    pub action: TokenAuditAction,
    pub actor: Option<UserId>,
    pub detail: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl TokenAuditEntry {
    pub fn new(token_id: TokenId, action: TokenAuditAction, actor: Option<UserId>, detail: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            token_id,
            action,
            actor,
            detail,
            occurred_at: Utc::now(),
        }
    }
}
