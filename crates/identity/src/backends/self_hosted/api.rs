//! Wire layer for the self-hosted identity service.
//!
//! Sessions are checked on the public API (`/sessions/whoami`); identities are
//! managed on the admin API (`/admin/identities`).

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use warden_auth::{Aal, AuthenticatedUser, IdentityClaims};
use warden_core::{AuthError, AuthResult, UnauthenticatedReason, UserId};

use crate::backends::http::{build_http_client, join_url, json_or_null, read_json, transport_error, unexpected_status};
use crate::client::UserRecord;
use crate::config::SelfHostedConfig;
use crate::credential::SessionCredential;

/// Credential types that give a user a second factor.
const SECOND_FACTOR_CREDENTIALS: [&str; 3] = ["totp", "webauthn", "lookup_secret"];

#[derive(Debug)]
pub(crate) struct SelfHostedApi {
    http: reqwest::Client,
    public_url: String,
    admin_url: String,
    admin_token: Option<String>,
    ui_url: String,
    pub step_up_window: chrono::Duration,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Session {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub authenticator_assurance_level: Option<String>,
    #[serde(default)]
    pub authentication_methods: Vec<AuthenticationMethod>,
    pub identity: RemoteIdentity,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthenticationMethod {
    #[serde(default)]
    pub aal: Option<String>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn current_aal(&self) -> Aal {
        self.authenticator_assurance_level
            .as_deref()
            .map(Aal::parse_lenient)
            .unwrap_or(Aal::Aal1)
    }

    /// Completion time of the latest second-factor method.
    pub fn last_aal2_at(&self) -> Option<DateTime<Utc>> {
        self.authentication_methods
            .iter()
            .filter(|m| m.aal.as_deref().map(Aal::parse_lenient) == Some(Aal::Aal2))
            .filter_map(|m| m.completed_at)
            .max()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct VerifiableAddress {
    pub value: String,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RemoteIdentity {
    pub id: String,
    #[serde(default)]
    pub schema_id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub traits: Value,
    #[serde(default)]
    pub verifiable_addresses: Vec<VerifiableAddress>,
    #[serde(default)]
    pub metadata_public: Option<Value>,
    #[serde(default)]
    pub credentials: Option<Map<String, Value>>,
}

impl RemoteIdentity {
    pub fn email(&self) -> Option<String> {
        self.traits.get("email").and_then(Value::as_str).map(str::to_string)
    }

    pub fn email_verified(&self) -> bool {
        let Some(email) = self.email() else {
            return false;
        };
        self.verifiable_addresses
            .iter()
            .any(|a| a.verified && a.value.eq_ignore_ascii_case(&email))
    }

    pub fn claims(&self) -> IdentityClaims {
        self.metadata_public
            .as_ref()
            .map(IdentityClaims::from_json)
            .unwrap_or_default()
    }

    /// Highest level reachable with the user's configured credentials.
    pub fn available_aal(&self) -> Aal {
        let has_second_factor = self
            .credentials
            .as_ref()
            .is_some_and(|creds| SECOND_FACTOR_CREDENTIALS.iter().any(|k| creds.contains_key(*k)));
        if has_second_factor { Aal::Aal2 } else { Aal::Aal1 }
    }

    pub fn into_record(self) -> AuthResult<UserRecord> {
        let claims = self.claims();
        Ok(UserRecord {
            email: self.email(),
            email_verified: self.email_verified(),
            display_name: self.traits.get("name").and_then(Value::as_str).map(str::to_string),
            disabled: self.state.as_deref() == Some("inactive"),
            tenant_id: claims.legacy_tenant_id.clone(),
            claims,
            user_id: UserId::new(self.id)?,
        })
    }

    pub fn into_authenticated(self) -> AuthResult<AuthenticatedUser> {
        let claims = self.claims();
        let email = self.email();
        let email_verified = self.email_verified();
        let user_id =
            UserId::new(self.id).map_err(|_| AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential))?;
        Ok(AuthenticatedUser {
            user_id,
            email,
            email_verified,
            tenant_id: claims.legacy_tenant_id.clone(),
            claims,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RecoveryLink {
    recovery_link: String,
}

#[derive(Debug, Deserialize)]
struct Flow {
    id: String,
}

fn error_id(body: &Value) -> Option<&str> {
    body.pointer("/error/id").and_then(Value::as_str)
}

/// Map a `whoami` failure.
///
/// An expired or cleared session is reported separately so clients can prompt
/// for re-authentication instead of treating it as a forged credential.
pub(crate) fn map_session_error(status: StatusCode, body: &Value) -> AuthError {
    match (status, error_id(body)) {
        (StatusCode::UNAUTHORIZED, Some("session_inactive")) => {
            AuthError::unauthenticated(UnauthenticatedReason::SessionInactive)
        }
        (StatusCode::FORBIDDEN, Some("session_aal2_required")) => AuthError::StepUpRequired,
        (StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST, _) => {
            AuthError::unauthenticated(UnauthenticatedReason::SessionNotFound)
        }
        (status, _) => unexpected_status("verify_session", status, "unexpected session response"),
    }
}

pub(crate) fn map_admin_error(op: &'static str, status: StatusCode, body: &Value) -> AuthError {
    match status {
        StatusCode::NOT_FOUND => AuthError::UserNotFound,
        StatusCode::CONFLICT => AuthError::already_exists("a user with this identifier already exists"),
        _ => {
            let detail = body
                .pointer("/error/reason")
                .or_else(|| body.pointer("/error/message"))
                .and_then(Value::as_str)
                .unwrap_or("request rejected");
            unexpected_status(op, status, detail)
        }
    }
}

impl SelfHostedApi {
    pub fn new(config: &SelfHostedConfig, timeout: std::time::Duration) -> AuthResult<Self> {
        let step_up_window = chrono::Duration::from_std(config.step_up_window)
            .map_err(|_| AuthError::invalid("step-up window out of range"))?;
        Ok(Self {
            http: build_http_client(timeout)?,
            public_url: config.public_url.clone(),
            admin_url: config.admin_url.clone(),
            admin_token: config.admin_token.clone(),
            ui_url: config.ui_url.clone(),
            step_up_window,
        })
    }

    pub async fn whoami(&self, credential: &SessionCredential) -> AuthResult<Session> {
        const OP: &str = "verify_session";
        let req = self.http.get(join_url(&self.public_url, "sessions/whoami"));
        let req = match credential {
            SessionCredential::Cookie { name, value } => req.header("Cookie", format!("{name}={value}")),
            other => req.header("X-Session-Token", other.token()),
        };
        let resp = req.send().await.map_err(|e| transport_error(OP, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(map_session_error(status, &json_or_null(resp).await));
        }
        let session: Session = read_json(OP, resp).await?;
        if !session.active {
            return Err(AuthError::unauthenticated(UnauthenticatedReason::SessionInactive));
        }
        Ok(session)
    }

    async fn admin(&self, op: &'static str, method: Method, path: &str, body: Option<&Value>) -> AuthResult<Value> {
        let mut req = self.http.request(method, join_url(&self.admin_url, path));
        if let Some(token) = &self.admin_token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| transport_error(op, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(map_admin_error(op, status, &json_or_null(resp).await));
        }
        Ok(json_or_null(resp).await)
    }

    fn parse_identity(op: &'static str, value: Value) -> AuthResult<RemoteIdentity> {
        serde_json::from_value(value).map_err(|_| AuthError::backend(format!("{op}: malformed identity")))
    }

    pub async fn get_identity(&self, op: &'static str, id: &str) -> AuthResult<RemoteIdentity> {
        let value = self
            .admin(op, Method::GET, &format!("admin/identities/{id}"), None)
            .await?;
        Self::parse_identity(op, value)
    }

    pub async fn find_identity_by_email(&self, email: &str) -> AuthResult<RemoteIdentity> {
        const OP: &str = "get_user_by_email";
        let resp = self
            .http
            .get(join_url(&self.admin_url, "admin/identities"))
            .query(&[("credentials_identifier", email)]);
        let resp = match &self.admin_token {
            Some(token) => resp.bearer_auth(token),
            None => resp,
        };
        let resp = resp.send().await.map_err(|e| transport_error(OP, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(map_admin_error(OP, status, &json_or_null(resp).await));
        }
        let found: Vec<RemoteIdentity> = read_json(OP, resp).await?;
        found.into_iter().next().ok_or(AuthError::UserNotFound)
    }

    pub async fn create_identity(&self, body: &Value) -> AuthResult<RemoteIdentity> {
        let value = self
            .admin("create_user", Method::POST, "admin/identities", Some(body))
            .await?;
        Self::parse_identity("create_user", value)
    }

    pub async fn replace_identity(&self, id: &str, body: &Value) -> AuthResult<RemoteIdentity> {
        let value = self
            .admin("update_user", Method::PUT, &format!("admin/identities/{id}"), Some(body))
            .await?;
        Self::parse_identity("update_user", value)
    }

    /// JSON Patch (RFC 6902) against the identity.
    pub async fn patch_identity(&self, op: &'static str, id: &str, ops: &Value) -> AuthResult<()> {
        self.admin(op, Method::PATCH, &format!("admin/identities/{id}"), Some(ops))
            .await
            .map(|_| ())
    }

    pub async fn delete_identity(&self, id: &str) -> AuthResult<()> {
        self.admin("delete_user", Method::DELETE, &format!("admin/identities/{id}"), None)
            .await
            .map(|_| ())
    }

    pub async fn recovery_link(&self, identity_id: &str) -> AuthResult<String> {
        let body = json!({ "identity_id": identity_id, "expires_in": "1h" });
        let value = self
            .admin("password_reset_link", Method::POST, "admin/recovery/link", Some(&body))
            .await?;
        let link: RecoveryLink = serde_json::from_value(value)
            .map_err(|_| AuthError::backend("password_reset_link: malformed response"))?;
        Ok(link.recovery_link)
    }

    /// Start an API verification flow for `email` and return the UI link for it.
    pub async fn verification_link(&self, email: &str) -> AuthResult<String> {
        const OP: &str = "email_verification_link";
        let resp = self
            .http
            .get(join_url(&self.public_url, "self-service/verification/api"))
            .send()
            .await
            .map_err(|e| transport_error(OP, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unexpected_status(OP, status, "could not start verification flow"));
        }
        let flow: Flow = read_json(OP, resp).await?;

        let resp = self
            .http
            .post(join_url(&self.public_url, "self-service/verification"))
            .query(&[("flow", flow.id.as_str())])
            .json(&json!({ "method": "code", "email": email }))
            .send()
            .await
            .map_err(|e| transport_error(OP, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(unexpected_status(OP, status, "verification flow rejected the address"));
        }

        Ok(format!("{}/verification?flow={}", self.ui_url.trim_end_matches('/'), flow.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactive_and_missing_sessions_are_distinguished() {
        let inactive = json!({ "error": { "id": "session_inactive", "code": 401 } });
        assert_eq!(
            map_session_error(StatusCode::UNAUTHORIZED, &inactive),
            AuthError::unauthenticated(UnauthenticatedReason::SessionInactive)
        );
        assert_eq!(
            map_session_error(StatusCode::UNAUTHORIZED, &Value::Null),
            AuthError::unauthenticated(UnauthenticatedReason::SessionNotFound)
        );
    }

    #[test]
    fn aal2_required_maps_to_step_up() {
        let body = json!({ "error": { "id": "session_aal2_required" } });
        assert_eq!(map_session_error(StatusCode::FORBIDDEN, &body), AuthError::StepUpRequired);
    }

    #[test]
    fn available_aal_follows_credentials() {
        let mut identity: RemoteIdentity = serde_json::from_value(json!({
            "id": "i1",
            "traits": { "email": "a@example.com" },
            "credentials": { "password": {} }
        }))
        .unwrap();
        assert_eq!(identity.available_aal(), Aal::Aal1);

        identity
            .credentials
            .as_mut()
            .unwrap()
            .insert("totp".into(), json!({}));
        assert_eq!(identity.available_aal(), Aal::Aal2);
    }

    #[test]
    fn email_verification_comes_from_matching_address() {
        let identity: RemoteIdentity = serde_json::from_value(json!({
            "id": "i1",
            "traits": { "email": "A@example.com" },
            "verifiable_addresses": [
                { "value": "other@example.com", "verified": true },
                { "value": "a@example.com", "verified": false }
            ]
        }))
        .unwrap();
        assert!(!identity.email_verified());
    }
}
