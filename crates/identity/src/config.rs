use std::time::Duration;

use warden_core::{AuthError, AuthResult};

use crate::registry::ProviderKind;

pub const DEFAULT_STEP_UP_WINDOW_SECS: u64 = 600;
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;

/// Managed-cloud backend (tenants are first-class in the backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedCloudConfig {
    pub base_url: String,
    /// Public key used for token verification calls.
    pub api_key: String,
    pub project_id: String,
    /// Bearer token for admin calls.
    pub admin_token: String,
}

/// Self-hosted backend (single identity pool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfHostedConfig {
    pub public_url: String,
    pub admin_url: String,
    pub admin_token: Option<String>,
    /// Base URL of the self-service UI; used to build verification links.
    pub ui_url: String,
    pub step_up_window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub managed_cloud: Option<ManagedCloudConfig>,
    pub self_hosted: Option<SelfHostedConfig>,
    pub backend_timeout: Duration,
}

impl ProviderConfig {
    /// Read provider settings from `WARDEN_*` environment variables.
    ///
    /// Only the section for the selected kind is required.
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ProviderConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &str| get(name).ok_or_else(|| AuthError::invalid(format!("{name} must be set")));
        let secs = |name: &str, default: u64| -> AuthResult<u64> {
            match get(name) {
                Some(v) => v
                    .parse::<u64>()
                    .map_err(|_| AuthError::invalid(format!("{name} must be a number of seconds"))),
                None => Ok(default),
            }
        };

        let kind = ProviderKind::new(get("WARDEN_IDENTITY_PROVIDER").unwrap_or_else(|| ProviderKind::SELF_HOSTED.into()));
        let backend_timeout = Duration::from_secs(secs("WARDEN_BACKEND_TIMEOUT_SECS", DEFAULT_BACKEND_TIMEOUT_SECS)?);

        let managed_cloud = if kind.as_str() == ProviderKind::MANAGED_CLOUD {
            Some(ManagedCloudConfig {
                base_url: require("WARDEN_CLOUD_BASE_URL")?,
                api_key: require("WARDEN_CLOUD_API_KEY")?,
                project_id: require("WARDEN_CLOUD_PROJECT_ID")?,
                admin_token: require("WARDEN_CLOUD_ADMIN_TOKEN")?,
            })
        } else {
            None
        };

        let self_hosted = if kind.as_str() == ProviderKind::SELF_HOSTED {
            let public_url = require("WARDEN_SELF_HOSTED_PUBLIC_URL")?;
            Some(SelfHostedConfig {
                admin_url: require("WARDEN_SELF_HOSTED_ADMIN_URL")?,
                admin_token: get("WARDEN_SELF_HOSTED_ADMIN_TOKEN"),
                ui_url: get("WARDEN_SELF_HOSTED_UI_URL").unwrap_or_else(|| public_url.clone()),
                public_url,
                step_up_window: Duration::from_secs(secs("WARDEN_STEP_UP_WINDOW_SECS", DEFAULT_STEP_UP_WINDOW_SECS)?),
            })
        } else {
            None
        };

        Ok(Self {
            kind,
            managed_cloud,
            self_hosted,
            backend_timeout,
        })
    }
}
