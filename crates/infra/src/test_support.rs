//! In-process identity provider used by this crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use warden_auth::{AuthenticatedUser, GlobalRole, IdentityClaims};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason, UserId};
use warden_identity::backends::self_hosted::DirectoryTenantManager;
use warden_identity::{
    IdentityClient, IdentityProvider, NewUser, ProviderKind, SessionCredential, TenantManager, UserRecord, UserUpdate,
};

use crate::tenants::InMemoryTenantDirectory;

#[derive(Default)]
pub struct FakeClient {
    users: Mutex<HashMap<UserId, UserRecord>>,
    fail_claim_writes: AtomicBool,
}

fn unsupported<T>() -> AuthResult<T> {
    Err(AuthError::invalid("not supported by the fake client"))
}

#[async_trait]
impl IdentityClient for FakeClient {
    fn tenant_id(&self) -> Option<&TenantId> {
        None
    }

    async fn create_user(&self, _user: NewUser) -> AuthResult<UserRecord> {
        unsupported()
    }

    async fn get_user(&self, user_id: &UserId) -> AuthResult<UserRecord> {
        self.users.lock().unwrap().get(user_id).cloned().ok_or(AuthError::UserNotFound)
    }

    async fn get_user_by_email(&self, _email: &str) -> AuthResult<UserRecord> {
        unsupported()
    }

    async fn update_user(&self, _user_id: &UserId, _update: UserUpdate) -> AuthResult<UserRecord> {
        unsupported()
    }

    async fn delete_user(&self, _user_id: &UserId) -> AuthResult<()> {
        unsupported()
    }

    async fn set_claims(&self, user_id: &UserId, claims: &IdentityClaims) -> AuthResult<()> {
        if self.fail_claim_writes.load(Ordering::SeqCst) {
            return Err(AuthError::backend("claims endpoint down"));
        }
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(user_id).ok_or(AuthError::UserNotFound)?;
        user.claims = claims.clone();
        Ok(())
    }

    async fn verify_session(&self, _credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        Err(AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential))
    }

    async fn password_reset_link(&self, _email: &str) -> AuthResult<String> {
        unsupported()
    }

    async fn email_verification_link(&self, _email: &str) -> AuthResult<String> {
        unsupported()
    }
}

pub struct FakeProvider {
    client: Arc<FakeClient>,
    directory: Arc<InMemoryTenantDirectory>,
    tenants: Arc<DirectoryTenantManager>,
    evicted: Mutex<Vec<TenantId>>,
}

impl FakeProvider {
    pub fn with_users(user_ids: &[&str]) -> Arc<Self> {
        let client = FakeClient::default();
        {
            let mut users = client.users.lock().unwrap();
            for id in user_ids {
                let user_id = UserId::new(*id).unwrap();
                users.insert(
                    user_id.clone(),
                    UserRecord {
                        user_id,
                        email: Some(format!("{id}@example.com")),
                        email_verified: true,
                        display_name: None,
                        disabled: false,
                        claims: IdentityClaims::default(),
                        tenant_id: None,
                    },
                );
            }
        }
        let directory = InMemoryTenantDirectory::arc();
        Arc::new(Self {
            client: Arc::new(client),
            tenants: Arc::new(DirectoryTenantManager::new(directory.clone())),
            directory,
            evicted: Mutex::new(Vec::new()),
        })
    }

    pub fn directory(&self) -> Arc<InMemoryTenantDirectory> {
        self.directory.clone()
    }

    pub fn claims_of(&self, user_id: &UserId) -> IdentityClaims {
        self.client.users.lock().unwrap()[user_id].claims.clone()
    }

    pub fn make_super_admin_with_legacy(&self, user_id: &str, legacy_tenant: &str) {
        let mut users = self.client.users.lock().unwrap();
        let user = users.get_mut(&UserId::new(user_id).unwrap()).unwrap();
        user.claims.global_roles.insert(GlobalRole::SuperAdmin);
        user.claims.legacy_tenant_id = Some(TenantId::new(legacy_tenant).unwrap());
    }

    pub fn fail_claim_writes(&self, fail: bool) {
        self.client.fail_claim_writes.store(fail, Ordering::SeqCst);
    }

    pub fn evicted(&self) -> Vec<TenantId> {
        self.evicted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::self_hosted()
    }

    fn client(&self) -> Arc<dyn IdentityClient> {
        self.client.clone()
    }

    fn client_for(&self, _tenant_id: &TenantId) -> AuthResult<Arc<dyn IdentityClient>> {
        Ok(self.client.clone())
    }

    fn tenant_manager(&self) -> Arc<dyn TenantManager> {
        self.tenants.clone()
    }

    async fn verify_token(&self, credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        self.client.verify_session(credential).await
    }

    async fn verify_token_with_tenant(&self, _tenant_id: &TenantId, raw_token: &str) -> AuthResult<AuthenticatedUser> {
        self.client.verify_session(&SessionCredential::bearer(raw_token)).await
    }

    fn supports_step_up(&self) -> bool {
        false
    }

    fn evict_tenant(&self, tenant_id: &TenantId) {
        self.evicted.lock().unwrap().push(tenant_id.clone());
    }
}
