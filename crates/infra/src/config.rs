//! Process configuration, read once at start-up from `WARDEN_*` variables.

use std::net::SocketAddr;

use warden_auth::RoutePrefixes;
use warden_core::{AuthError, AuthResult};
use warden_identity::ProviderConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_BASE_DOMAIN: &str = "localhost";
pub const DEFAULT_SESSION_COOKIE: &str = "warden_session";

#[derive(Debug, Clone)]
pub struct WardenConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs on in-memory stores.
    pub database_url: Option<String>,
    /// Domain tenants are hosted under (`acme.<base_domain>`).
    pub base_domain: String,
    /// Subdomains that mean "no tenant scope".
    pub root_subdomains: Vec<String>,
    pub session_cookie: String,
    pub route_prefixes: RoutePrefixes,
    pub provider: ProviderConfig,
}

impl WardenConfig {
    pub fn from_env() -> AuthResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AuthResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = get("WARDEN_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| AuthError::invalid(format!("WARDEN_BIND_ADDR: {e}")))?;

        let root_subdomains = match get("WARDEN_ROOT_SUBDOMAINS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => vec!["www".to_string()],
        };

        let defaults = RoutePrefixes::default();
        let route_prefixes = RoutePrefixes {
            public: get("WARDEN_PREFIX_PUBLIC").unwrap_or(defaults.public),
            user_management: get("WARDEN_PREFIX_USERS").unwrap_or(defaults.user_management),
            admin: get("WARDEN_PREFIX_ADMIN").unwrap_or(defaults.admin),
            superadmin: get("WARDEN_PREFIX_SUPERADMIN").unwrap_or(defaults.superadmin),
        };
        for prefix in [
            &route_prefixes.public,
            &route_prefixes.user_management,
            &route_prefixes.admin,
            &route_prefixes.superadmin,
        ] {
            if !prefix.starts_with('/') {
                return Err(AuthError::invalid(format!("route prefix '{prefix}' must start with '/'")));
            }
        }

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            base_domain: get("WARDEN_BASE_DOMAIN")
                .unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string())
                .trim_start_matches('.')
                .to_ascii_lowercase(),
            root_subdomains,
            session_cookie: get("WARDEN_SESSION_COOKIE").unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
            route_prefixes,
            provider: ProviderConfig::from_lookup(&lookup)?,
        })
    }
}
