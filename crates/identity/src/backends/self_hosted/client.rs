use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use warden_auth::{AssuranceLevel, AuthenticatedUser, IdentityClaims};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason, UserId};

use super::api::SelfHostedApi;
use crate::client::{IdentityClient, NewUser, UserRecord, UserUpdate};
use crate::credential::SessionCredential;

const DEFAULT_SCHEMA: &str = "default";

/// Client for the single self-hosted identity pool.
#[derive(Debug, Clone)]
pub struct SelfHostedClient {
    api: Arc<SelfHostedApi>,
}

impl SelfHostedClient {
    pub(crate) fn new(api: Arc<SelfHostedApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl IdentityClient for SelfHostedClient {
    fn tenant_id(&self) -> Option<&TenantId> {
        None
    }

    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord> {
        let email = user.email.trim().to_ascii_lowercase();
        if email.is_empty() {
            return Err(AuthError::invalid("email must not be empty"));
        }
        let mut traits = json!({ "email": email });
        if let Some(name) = &user.display_name {
            traits["name"] = json!(name);
        }
        let mut body = json!({
            "schema_id": DEFAULT_SCHEMA,
            "state": "active",
            "traits": traits,
            "verifiable_addresses": [{
                "value": email,
                "via": "email",
                "verified": user.email_verified,
                "status": if user.email_verified { "completed" } else { "pending" },
            }],
        });
        if let Some(password) = &user.password {
            body["credentials"] = json!({ "password": { "config": { "password": password } } });
        }

        let created = self.api.create_identity(&body).await?;
        tracing::info!(user_id = %created.id, "user created");
        created.into_record()
    }

    async fn get_user(&self, user_id: &UserId) -> AuthResult<UserRecord> {
        self.api.get_identity("get_user", user_id.as_str()).await?.into_record()
    }

    async fn get_user_by_email(&self, email: &str) -> AuthResult<UserRecord> {
        self.api
            .find_identity_by_email(&email.trim().to_ascii_lowercase())
            .await?
            .into_record()
    }

    async fn update_user(&self, user_id: &UserId, update: UserUpdate) -> AuthResult<UserRecord> {
        let current = self.api.get_identity("update_user", user_id.as_str()).await?;
        if update.is_empty() {
            return current.into_record();
        }

        let mut traits = current.traits.clone();
        if !traits.is_object() {
            traits = json!({});
        }
        if let Some(email) = &update.email {
            traits["email"] = json!(email.trim().to_ascii_lowercase());
        }
        if let Some(name) = &update.display_name {
            traits["name"] = json!(name);
        }
        let state = match update.disabled {
            Some(true) => "inactive",
            Some(false) => "active",
            None => current.state.as_deref().unwrap_or("active"),
        };

        let mut body = json!({
            "schema_id": current.schema_id.as_deref().unwrap_or(DEFAULT_SCHEMA),
            "state": state,
            "traits": traits.clone(),
            "metadata_public": current.metadata_public.clone().unwrap_or(Value::Null),
        });
        if let Some(verified) = update.email_verified {
            let email = traits.get("email").and_then(Value::as_str).unwrap_or_default();
            body["verifiable_addresses"] = json!([{
                "value": email,
                "via": "email",
                "verified": verified,
                "status": if verified { "completed" } else { "pending" },
            }]);
        }
        if let Some(password) = &update.password {
            body["credentials"] = json!({ "password": { "config": { "password": password } } });
        }

        let updated = self.api.replace_identity(user_id.as_str(), &body).await?;
        tracing::info!(user_id = %user_id, "user updated");
        updated.into_record()
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<()> {
        self.api.delete_identity(user_id.as_str()).await?;
        tracing::info!(user_id = %user_id, "user deleted");
        Ok(())
    }

    async fn set_claims(&self, user_id: &UserId, claims: &IdentityClaims) -> AuthResult<()> {
        let ops = json!([{ "op": "add", "path": "/metadata_public", "value": claims.to_json() }]);
        self.api.patch_identity("set_claims", user_id.as_str(), &ops).await
    }

    async fn verify_session(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        if credential.token().is_empty() {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::MissingCredential));
        }
        self.api.whoami(credential).await?.identity.into_authenticated()
    }

    async fn password_reset_link(&self, email: &str) -> AuthResult<String> {
        let identity = self.api.find_identity_by_email(&email.trim().to_ascii_lowercase()).await?;
        self.api.recovery_link(&identity.id).await
    }

    async fn email_verification_link(&self, email: &str) -> AuthResult<String> {
        self.api.verification_link(&email.trim().to_ascii_lowercase()).await
    }

    async fn assurance_level(&self, credential: &SessionCredential) -> AuthResult<Option<AssuranceLevel>> {
        let session = self.api.whoami(credential).await?;
        let identity = self.api.get_identity("assurance_level", &session.identity.id).await?;
        let current = session.current_aal();
        Ok(Some(AssuranceLevel::from_last_aal2(
            current,
            identity.available_aal().max(current),
            session.last_aal2_at(),
            Utc::now(),
            self.api.step_up_window,
        )))
    }
}
