use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use warden_auth::{AuthenticatedUser, IdentityClaims};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason, UserId};

use super::api::CloudApi;
use crate::client::{IdentityClient, NewUser, UserRecord, UserUpdate};
use crate::credential::SessionCredential;

/// Client bound to the root pool or to one backend tenant.
#[derive(Debug, Clone)]
pub struct ManagedCloudClient {
    api: Arc<CloudApi>,
    tenant_id: Option<TenantId>,
}

impl ManagedCloudClient {
    pub(crate) fn root(api: Arc<CloudApi>) -> Self {
        Self { api, tenant_id: None }
    }

    pub(crate) fn for_tenant(api: Arc<CloudApi>, tenant_id: TenantId) -> Self {
        Self {
            api,
            tenant_id: Some(tenant_id),
        }
    }

    fn scope(&self) -> Option<&TenantId> {
        self.tenant_id.as_ref()
    }
}

#[async_trait]
impl IdentityClient for ManagedCloudClient {
    fn tenant_id(&self) -> Option<&TenantId> {
        self.scope()
    }

    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord> {
        let email = user.email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(AuthError::invalid("email must not be empty"));
        }
        let mut body = json!({
            "email": email,
            "emailVerified": user.email_verified,
        });
        if let Some(password) = &user.password {
            body["password"] = json!(password);
        }
        if let Some(name) = &user.display_name {
            body["displayName"] = json!(name);
        }
        let local_id = self.api.create_account(self.scope(), body).await?;
        tracing::info!(user_id = %local_id, tenant_id = ?self.tenant_id, "user created");

        Ok(UserRecord {
            user_id: UserId::new(local_id)?,
            email: Some(email),
            email_verified: user.email_verified,
            display_name: user.display_name,
            disabled: false,
            claims: IdentityClaims::default(),
            tenant_id: self.tenant_id.clone(),
        })
    }

    async fn get_user(&self, user_id: &UserId) -> AuthResult<UserRecord> {
        self.api
            .lookup_user(self.scope(), json!({ "localId": [user_id.as_str()] }))
            .await?
            .into_record()
    }

    async fn get_user_by_email(&self, email: &str) -> AuthResult<UserRecord> {
        self.api
            .lookup_user(self.scope(), json!({ "email": [email.trim().to_ascii_lowercase()] }))
            .await?
            .into_record()
    }

    async fn update_user(&self, user_id: &UserId, update: UserUpdate) -> AuthResult<UserRecord> {
        if !update.is_empty() {
            let mut body = Map::new();
            body.insert("localId".into(), json!(user_id.as_str()));
            if let Some(email) = &update.email {
                body.insert("email".into(), json!(email.trim().to_ascii_lowercase()));
            }
            if let Some(password) = &update.password {
                body.insert("password".into(), json!(password));
            }
            if let Some(name) = &update.display_name {
                body.insert("displayName".into(), json!(name));
            }
            if let Some(verified) = update.email_verified {
                body.insert("emailVerified".into(), json!(verified));
            }
            if let Some(disabled) = update.disabled {
                body.insert("disableUser".into(), json!(disabled));
            }
            self.api
                .update_account("update_user", self.scope(), Value::Object(body))
                .await?;
        }
        self.get_user(user_id).await
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<()> {
        self.api.delete_account(self.scope(), user_id).await?;
        tracing::info!(user_id = %user_id, tenant_id = ?self.tenant_id, "user deleted");
        Ok(())
    }

    async fn set_claims(&self, user_id: &UserId, claims: &IdentityClaims) -> AuthResult<()> {
        let body = json!({
            "localId": user_id.as_str(),
            "customAttributes": claims.to_json().to_string(),
        });
        self.api.update_account("set_claims", self.scope(), body).await
    }

    async fn verify_session(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        let token = credential.token();
        if token.is_empty() {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::MissingCredential));
        }
        let user = self.api.lookup_token(token, self.scope()).await?;
        if user.disabled {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential));
        }
        let authenticated = user.into_authenticated()?;
        if let Some(expected) = &self.tenant_id {
            if authenticated.tenant_id.as_ref() != Some(expected) {
                tracing::debug!(expected = %expected, actual = ?authenticated.tenant_id, "token minted for another tenant");
                return Err(AuthError::unauthenticated(UnauthenticatedReason::TenantMismatch));
            }
        }
        Ok(authenticated)
    }

    async fn password_reset_link(&self, email: &str) -> AuthResult<String> {
        self.api
            .oob_link("password_reset_link", self.scope(), "PASSWORD_RESET", email)
            .await
    }

    async fn email_verification_link(&self, email: &str) -> AuthResult<String> {
        self.api
            .oob_link("email_verification_link", self.scope(), "VERIFY_EMAIL", email)
            .await
    }
}
