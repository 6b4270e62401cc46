use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use warden_auth::{AssuranceLevel, AuthenticatedUser, IdentityClaims};
use warden_core::{AuthResult, TenantId, UserId};

use crate::credential::SessionCredential;

/// User as stored by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub email: Option<String>,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub disabled: bool,
    pub claims: IdentityClaims,
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub disabled: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.display_name.is_none()
            && self.email_verified.is_none()
            && self.disabled.is_none()
    }
}

/// Capability interface every identity backend implements.
///
/// A client is bound to one user pool: the backend's root pool, or one
/// tenant's pool for backends with first-class tenants. All backend failures
/// are converted to [`warden_core::AuthError`] before they are returned.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Tenant this client is scoped to (`None` for the root pool).
    fn tenant_id(&self) -> Option<&TenantId>;

    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord>;

    async fn get_user(&self, user_id: &UserId) -> AuthResult<UserRecord>;

    async fn get_user_by_email(&self, email: &str) -> AuthResult<UserRecord>;

    async fn update_user(&self, user_id: &UserId, update: UserUpdate) -> AuthResult<UserRecord>;

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<()>;

    /// Overwrite the backend-side copy of the user's authorization claims.
    async fn set_claims(&self, user_id: &UserId, claims: &IdentityClaims) -> AuthResult<()>;

    async fn verify_session(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser>;

    async fn password_reset_link(&self, email: &str) -> AuthResult<String>;

    async fn email_verification_link(&self, email: &str) -> AuthResult<String>;

    /// Assurance snapshot for the session; `None` when the backend has no
    /// step-up support.
    async fn assurance_level(&self, _credential: &SessionCredential) -> AuthResult<Option<AssuranceLevel>> {
        Ok(None)
    }
}
