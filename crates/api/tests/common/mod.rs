//! Shared harness for the black-box API tests: a scripted identity provider,
//! in-memory stores and a `oneshot` request helper.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use warden_api::{build_app, AppServices, HttpSettings};
use warden_auth::{AssuranceLevel, AuthenticatedUser, GlobalRole, IdentityClaims, TenantRole};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason, UserId};
use warden_identity::backends::self_hosted::DirectoryTenantManager;
use warden_identity::{
    IdentityClient, IdentityProvider, NewTenant, NewUser, ProviderKind, SessionCredential, SignInOptions,
    TenantManager, UserRecord, UserUpdate,
};
use warden_infra::api_tokens::InMemoryApiTokenStore;
use warden_infra::membership::InMemoryMembershipStore;
use warden_infra::tenants::InMemoryTenantDirectory;
use warden_infra::Stores;

pub const BASE_DOMAIN: &str = "example.com";

// ─────────────────────────────────────────────────────────────────────────────
// Scripted identity backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedClient {
    users: Mutex<HashMap<UserId, UserRecord>>,
}

impl ScriptedClient {
    fn add(&self, user_id: &UserId, email: &str) {
        self.users.lock().unwrap().insert(
            user_id.clone(),
            UserRecord {
                user_id: user_id.clone(),
                email: Some(email.to_string()),
                email_verified: true,
                display_name: None,
                disabled: false,
                claims: IdentityClaims::default(),
                tenant_id: None,
            },
        );
    }

    fn edit_claims(&self, user_id: &UserId, edit: impl FnOnce(&mut IdentityClaims)) {
        let mut users = self.users.lock().unwrap();
        edit(&mut users.get_mut(user_id).expect("known user").claims);
    }

    fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            .cloned()
    }
}

#[async_trait]
impl IdentityClient for ScriptedClient {
    fn tenant_id(&self) -> Option<&TenantId> {
        None
    }

    async fn create_user(&self, user: NewUser) -> AuthResult<UserRecord> {
        if self.find_by_email(&user.email).is_some() {
            return Err(AuthError::already_exists("email"));
        }
        let local = user.email.split('@').next().unwrap_or_default();
        let user_id = UserId::new(format!("u-{local}"))?;
        self.add(&user_id, &user.email);
        self.get_user(&user_id).await
    }

    async fn get_user(&self, user_id: &UserId) -> AuthResult<UserRecord> {
        self.users.lock().unwrap().get(user_id).cloned().ok_or(AuthError::UserNotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> AuthResult<UserRecord> {
        self.find_by_email(email).ok_or(AuthError::UserNotFound)
    }

    async fn update_user(&self, user_id: &UserId, _update: UserUpdate) -> AuthResult<UserRecord> {
        self.get_user(user_id).await
    }

    async fn delete_user(&self, user_id: &UserId) -> AuthResult<()> {
        self.users
            .lock()
            .unwrap()
            .remove(user_id)
            .map(|_| ())
            .ok_or(AuthError::UserNotFound)
    }

    async fn set_claims(&self, user_id: &UserId, claims: &IdentityClaims) -> AuthResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(user_id).ok_or(AuthError::UserNotFound)?;
        user.claims = claims.clone();
        Ok(())
    }

    async fn verify_session(&self, _credential: &SessionCredential) -> AuthResult<AuthenticatedUser> {
        Err(AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential))
    }

    async fn password_reset_link(&self, email: &str) -> AuthResult<String> {
        self.get_user_by_email(email).await?;
        Ok(format!("https://auth.example.com/recovery?email={email}"))
    }

    async fn email_verification_link(&self, email: &str) -> AuthResult<String> {
        self.get_user_by_email(email).await?;
        Ok(format!("https://auth.example.com/verification?email={email}"))
    }
}

#[derive(Clone)]
struct ScriptedSession {
    user_id: UserId,
    tenant_id: Option<TenantId>,
    active: bool,
}

/// Provider whose sessions are registered by the test.
///
/// Verified identities read the user's current claims, so claim syncs done by
/// the membership service are visible to the next request.
pub struct ScriptedProvider {
    client: Arc<ScriptedClient>,
    tenants: Arc<DirectoryTenantManager>,
    sessions: Mutex<HashMap<String, ScriptedSession>>,
    assurance: Mutex<HashMap<String, AssuranceLevel>>,
    step_up: bool,
}

#[async_trait]
impl IdentityProvider for ScriptedProvider {
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
        let session = self
            .sessions
            .lock()
            .unwrap()
            .get(credential.token())
            .cloned()
            .ok_or(AuthError::unauthenticated(UnauthenticatedReason::SessionNotFound))?;
        if !session.active {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::SessionInactive));
        }
        let record = self.client.get_user(&session.user_id).await?;
        Ok(AuthenticatedUser {
            user_id: record.user_id,
            email: record.email,
            email_verified: record.email_verified,
            claims: record.claims,
            tenant_id: session.tenant_id,
        })
    }

    async fn verify_token_with_tenant(&self, tenant_id: &TenantId, raw_token: &str) -> AuthResult<AuthenticatedUser> {
        let user = self.verify_token(&SessionCredential::bearer(raw_token)).await?;
        if user.tenant_id.as_ref() != Some(tenant_id) {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::TenantMismatch));
        }
        Ok(user)
    }

    fn supports_step_up(&self) -> bool {
        self.step_up
    }

    async fn assurance_level(&self, credential: &SessionCredential) -> AuthResult<Option<AssuranceLevel>> {
        if !self.step_up {
            return Ok(None);
        }
        Ok(self.assurance.lock().unwrap().get(credential.token()).copied())
    }

    fn evict_tenant(&self, _tenant_id: &TenantId) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub app: Router,
    pub services: Arc<AppServices>,
    pub provider: Arc<ScriptedProvider>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(false)
    }

    /// Harness whose backend enforces step-up.
    pub fn with_step_up() -> Self {
        Self::build(true)
    }

    fn build(step_up: bool) -> Self {
        let directory = InMemoryTenantDirectory::arc();
        let provider = Arc::new(ScriptedProvider {
            client: Arc::new(ScriptedClient::default()),
            tenants: Arc::new(DirectoryTenantManager::new(directory.clone())),
            sessions: Mutex::new(HashMap::new()),
            assurance: Mutex::new(HashMap::new()),
            step_up,
        });
        let stores = Stores {
            directory,
            memberships: InMemoryMembershipStore::arc(),
            api_tokens: InMemoryApiTokenStore::arc(),
        };
        let settings = HttpSettings {
            base_domain: BASE_DOMAIN.to_string(),
            ..HttpSettings::default()
        };
        let services = Arc::new(AppServices::new(settings, provider.clone(), stores));
        Self {
            app: build_app(services.clone()),
            services,
            provider,
        }
    }

    pub async fn tenant(&self, subdomain: &str) -> TenantId {
        self.services
            .tenants
            .create(NewTenant {
                subdomain: subdomain.to_string(),
                display_name: subdomain.to_uppercase(),
                sign_in_options: SignInOptions::default(),
            })
            .await
            .expect("tenant")
            .tenant_id
    }

    /// Register a user and a session token `tok-<id>` for them.
    pub fn user(&self, id: &str) -> UserId {
        self.user_with_session_tenant(id, None)
    }

    pub fn user_with_session_tenant(&self, id: &str, session_tenant: Option<&TenantId>) -> UserId {
        let user_id = UserId::new(id).unwrap();
        self.provider.client.add(&user_id, &format!("{id}@example.com"));
        self.provider.sessions.lock().unwrap().insert(
            token_for(id),
            ScriptedSession {
                user_id: user_id.clone(),
                tenant_id: session_tenant.cloned(),
                active: true,
            },
        );
        user_id
    }

    pub fn deactivate_session(&self, id: &str) {
        if let Some(s) = self.provider.sessions.lock().unwrap().get_mut(&token_for(id)) {
            s.active = false;
        }
    }

    pub fn make_super_admin(&self, user_id: &UserId) {
        self.provider
            .client
            .edit_claims(user_id, |c| {
                c.global_roles.insert(GlobalRole::SuperAdmin);
            });
    }

    pub fn set_legacy_tenant(&self, user_id: &UserId, tenant_id: &TenantId) {
        self.provider
            .client
            .edit_claims(user_id, |c| c.legacy_tenant_id = Some(tenant_id.clone()));
    }

    pub fn set_assurance(&self, id: &str, level: AssuranceLevel) {
        self.provider.assurance.lock().unwrap().insert(token_for(id), level);
    }

    pub async fn grant(&self, tenant_id: &TenantId, user_id: &UserId, roles: &[TenantRole]) {
        let system = UserId::new("system").unwrap();
        self.services
            .memberships
            .grant(tenant_id, user_id, roles.iter().copied().collect::<BTreeSet<_>>(), &system)
            .await
            .expect("grant");
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

pub fn token_for(id: &str) -> String {
    format!("tok-{id}")
}

pub fn host(subdomain: Option<&str>) -> String {
    match subdomain {
        Some(s) => format!("{s}.{BASE_DOMAIN}"),
        None => BASE_DOMAIN.to_string(),
    }
}

/// Request as user `id` (bearer session) against `host`.
pub fn as_user(method: &str, host: &str, path: &str, id: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(path)
        .header("host", host)
        .header("authorization", format!("Bearer {}", token_for(id)));
    with_body(builder, body)
}

pub fn anonymous(method: &str, host: &str, path: &str) -> Request<Body> {
    with_body(Request::builder().method(method).uri(path).header("host", host), None)
}

pub fn with_api_key(method: &str, host: &str, path: &str, key: &str) -> Request<Body> {
    with_body(
        Request::builder()
            .method(method)
            .uri(path)
            .header("host", host)
            .header("x-api-key", key),
        None,
    )
}

fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
