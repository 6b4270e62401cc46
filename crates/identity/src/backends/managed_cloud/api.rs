//! Wire layer for the managed-cloud identity service.
//!
//! Account endpoints live under `/v1/projects/{project}[/tenants/{tenant}]/accounts`,
//! tenant endpoints under `/v2/projects/{project}/tenants`. Token verification
//! uses the public `accounts:lookup` call keyed by the API key; everything
//! else is an admin call authenticated with a bearer token.

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use warden_auth::{AuthenticatedUser, IdentityClaims};
use warden_core::{AuthError, AuthResult, TenantId, UnauthenticatedReason, UserId};

use crate::backends::http::{build_http_client, json_or_null, join_url, read_json, transport_error, unexpected_status};
use crate::client::UserRecord;
use crate::config::ManagedCloudConfig;
use crate::tenant::SignInOptions;

#[derive(Debug)]
pub(crate) struct CloudApi {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    project_id: String,
    admin_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CloudUser {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// JSON document serialized as a string.
    #[serde(default)]
    pub custom_attributes: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl CloudUser {
    pub fn claims(&self) -> IdentityClaims {
        match self.custom_attributes.as_deref() {
            None | Some("") => IdentityClaims::default(),
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(v) => IdentityClaims::from_json(&v),
                Err(e) => {
                    tracing::debug!(user_id = %self.local_id, error = %e, "ignoring unparseable custom attributes");
                    IdentityClaims::default()
                }
            },
        }
    }

    fn tenant(&self) -> Option<TenantId> {
        self.tenant_id.as_deref().and_then(|t| TenantId::new(t).ok())
    }

    pub fn into_record(self) -> AuthResult<UserRecord> {
        let claims = self.claims();
        let tenant_id = self.tenant();
        Ok(UserRecord {
            user_id: UserId::new(self.local_id)?,
            email: self.email,
            email_verified: self.email_verified,
            display_name: self.display_name,
            disabled: self.disabled,
            claims,
            tenant_id,
        })
    }

    pub fn into_authenticated(self) -> AuthResult<AuthenticatedUser> {
        let claims = self.claims();
        let tenant_id = self.tenant();
        let user_id = UserId::new(self.local_id)
            .map_err(|_| AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential))?;
        Ok(AuthenticatedUser {
            user_id,
            email: self.email,
            email_verified: self.email_verified,
            claims,
            tenant_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<CloudUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CloudTenant {
    /// `projects/{project}/tenants/{tenant}`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub allow_password_signup: bool,
    #[serde(default)]
    pub enable_email_link_signin: bool,
}

impl CloudTenant {
    pub fn tenant_id(&self) -> AuthResult<TenantId> {
        let id = self.name.rsplit('/').next().unwrap_or_default();
        TenantId::new(id).map_err(|_| AuthError::backend("tenant response without id"))
    }
}

/// Backend error code, e.g. `EMAIL_EXISTS` from `"EMAIL_EXISTS : detail"`.
fn error_code(body: &Value) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .split([' ', ':'])
        .next()
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn map_cloud_error(op: &'static str, status: StatusCode, body: &Value) -> AuthError {
    let code = error_code(body);
    match code.as_str() {
        "EMAIL_EXISTS" | "DUPLICATE_EMAIL" | "DUPLICATE_LOCAL_ID" => {
            AuthError::already_exists("a user with this email already exists")
        }
        "USER_NOT_FOUND" | "EMAIL_NOT_FOUND" => AuthError::UserNotFound,
        "TENANT_NOT_FOUND" => AuthError::TenantNotFound,
        "INVALID_ID_TOKEN" | "MISSING_ID_TOKEN" | "USER_DISABLED" => {
            AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential)
        }
        "TOKEN_EXPIRED" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => AuthError::unauthenticated(UnauthenticatedReason::Expired),
        "TENANT_ID_MISMATCH" => AuthError::unauthenticated(UnauthenticatedReason::TenantMismatch),
        _ => unexpected_status(op, status, if code.is_empty() { "request rejected" } else { code.as_str() }),
    }
}

impl CloudApi {
    pub fn new(config: &ManagedCloudConfig, timeout: std::time::Duration) -> AuthResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            project_id: config.project_id.clone(),
            admin_token: config.admin_token.clone(),
        })
    }

    fn accounts_path(&self, tenant_id: Option<&TenantId>, action: &str) -> String {
        match tenant_id {
            Some(t) => format!("v1/projects/{}/tenants/{}/accounts{action}", self.project_id, t),
            None => format!("v1/projects/{}/accounts{action}", self.project_id),
        }
    }

    fn tenants_path(&self, tenant_id: Option<&TenantId>) -> String {
        match tenant_id {
            Some(t) => format!("v2/projects/{}/tenants/{}", self.project_id, t),
            None => format!("v2/projects/{}/tenants", self.project_id),
        }
    }

    async fn admin_call(&self, op: &'static str, method: Method, path: &str, body: Option<&Value>) -> AuthResult<Value> {
        let mut req = self
            .http
            .request(method, join_url(&self.base_url, path))
            .bearer_auth(&self.admin_token);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| transport_error(op, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(map_cloud_error(op, status, &json_or_null(resp).await));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(json_or_null(resp).await)
    }

    /// Verify an ID token via the public lookup endpoint.
    pub async fn lookup_token(&self, id_token: &str, tenant_id: Option<&TenantId>) -> AuthResult<CloudUser> {
        const OP: &str = "verify_token";
        let mut body = json!({ "idToken": id_token });
        if let Some(t) = tenant_id {
            body["tenantId"] = json!(t.as_str());
        }
        let resp = self
            .http
            .post(join_url(&self.base_url, "v1/accounts:lookup"))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(OP, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(match map_cloud_error(OP, status, &json_or_null(resp).await) {
                AuthError::UserNotFound => AuthError::unauthenticated(UnauthenticatedReason::SessionNotFound),
                AuthError::Invalid(_) => AuthError::unauthenticated(UnauthenticatedReason::InvalidCredential),
                other => other,
            });
        }
        let parsed: LookupResponse = read_json(OP, resp).await?;
        parsed
            .users
            .into_iter()
            .next()
            .ok_or(AuthError::unauthenticated(UnauthenticatedReason::SessionNotFound))
    }

    pub async fn lookup_user(&self, tenant_id: Option<&TenantId>, filter: Value) -> AuthResult<CloudUser> {
        let value = self
            .admin_call("get_user", Method::POST, &self.accounts_path(tenant_id, ":lookup"), Some(&filter))
            .await?;
        let parsed: LookupResponse = serde_json::from_value(value)
            .map_err(|_| AuthError::backend("get_user: malformed response"))?;
        parsed.users.into_iter().next().ok_or(AuthError::UserNotFound)
    }

    pub async fn create_account(&self, tenant_id: Option<&TenantId>, body: Value) -> AuthResult<String> {
        let value = self
            .admin_call("create_user", Method::POST, &self.accounts_path(tenant_id, ""), Some(&body))
            .await?;
        value
            .get("localId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::backend("create_user: response without localId"))
    }

    pub async fn update_account(&self, op: &'static str, tenant_id: Option<&TenantId>, body: Value) -> AuthResult<()> {
        self.admin_call(op, Method::POST, &self.accounts_path(tenant_id, ":update"), Some(&body))
            .await
            .map(|_| ())
    }

    pub async fn delete_account(&self, tenant_id: Option<&TenantId>, user_id: &UserId) -> AuthResult<()> {
        let body = json!({ "localId": user_id.as_str() });
        self.admin_call("delete_user", Method::POST, &self.accounts_path(tenant_id, ":delete"), Some(&body))
            .await
            .map(|_| ())
    }

    /// Out-of-band link (`PASSWORD_RESET`, `VERIFY_EMAIL`).
    pub async fn oob_link(&self, op: &'static str, tenant_id: Option<&TenantId>, request_type: &str, email: &str) -> AuthResult<String> {
        let body = json!({
            "requestType": request_type,
            "email": email,
            "returnOobLink": true,
        });
        let value = self
            .admin_call(op, Method::POST, &self.accounts_path(tenant_id, ":sendOobCode"), Some(&body))
            .await?;
        value
            .get("oobLink")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AuthError::backend(format!("{op}: response without link")))
    }

    pub async fn create_tenant(&self, display_name: &str, options: SignInOptions) -> AuthResult<CloudTenant> {
        let body = json!({
            "displayName": display_name,
            "allowPasswordSignup": options.allow_password_sign_up,
            "enableEmailLinkSignin": options.enable_email_link_sign_in,
        });
        let value = self
            .admin_call("create_tenant", Method::POST, &self.tenants_path(None), Some(&body))
            .await?;
        serde_json::from_value(value).map_err(|_| AuthError::backend("create_tenant: malformed response"))
    }

    pub async fn update_tenant(&self, tenant_id: &TenantId, display_name: &str, options: SignInOptions) -> AuthResult<()> {
        let body = json!({
            "displayName": display_name,
            "allowPasswordSignup": options.allow_password_sign_up,
            "enableEmailLinkSignin": options.enable_email_link_sign_in,
        });
        let path = format!(
            "{}?updateMask=displayName,allowPasswordSignup,enableEmailLinkSignin",
            self.tenants_path(Some(tenant_id))
        );
        self.admin_call("update_tenant", Method::PATCH, &path, Some(&body))
            .await
            .map(|_| ())
    }

    pub async fn delete_tenant(&self, tenant_id: &TenantId) -> AuthResult<()> {
        self.admin_call("delete_tenant", Method::DELETE, &self.tenants_path(Some(tenant_id)), None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_extracted_before_detail() {
        let body = json!({ "error": { "code": 400, "message": "TOKEN_EXPIRED : issued long ago" } });
        assert_eq!(error_code(&body), "TOKEN_EXPIRED");
        assert_eq!(
            map_cloud_error("op", StatusCode::BAD_REQUEST, &body),
            AuthError::unauthenticated(UnauthenticatedReason::Expired)
        );
    }

    #[test]
    fn duplicate_email_is_already_exists() {
        let body = json!({ "error": { "message": "EMAIL_EXISTS" } });
        assert_eq!(map_cloud_error("op", StatusCode::BAD_REQUEST, &body).code(), "already_exists");
    }

    #[test]
    fn unparseable_custom_attributes_yield_empty_claims() {
        let user = CloudUser {
            local_id: "u1".into(),
            email: None,
            email_verified: false,
            display_name: None,
            disabled: false,
            custom_attributes: Some("{not json".into()),
            tenant_id: None,
        };
        assert_eq!(user.claims(), IdentityClaims::default());
    }

    #[test]
    fn tenant_id_is_last_name_segment() {
        let t = CloudTenant {
            name: "projects/p1/tenants/acme-x1".into(),
            display_name: None,
            allow_password_signup: true,
            enable_email_link_signin: false,
        };
        assert_eq!(t.tenant_id().unwrap().as_str(), "acme-x1");
    }
}
