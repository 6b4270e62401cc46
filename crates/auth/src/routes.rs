use serde::{Deserialize, Serialize};

/// Permission class a request path falls into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// No identity work at all.
    Public,
    /// User management: reads for any authenticated caller, writes for admins.
    UserManagement,
    /// Tenant administration.
    Admin,
    /// Platform administration.
    SuperAdmin,
    /// Anything else: any authenticated identity.
    Authenticated,
}

impl RouteClass {
    /// Classes a service API key may never reach.
    pub fn is_privileged(&self) -> bool {
        matches!(self, RouteClass::UserManagement | RouteClass::Admin | RouteClass::SuperAdmin)
    }
}

/// Configurable path prefixes that define route classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePrefixes {
    pub public: String,
    pub user_management: String,
    pub admin: String,
    pub superadmin: String,
}

impl Default for RoutePrefixes {
    fn default() -> Self {
        Self {
            public: "/api/v1/public".to_string(),
            user_management: "/api/v1/users".to_string(),
            admin: "/admin-api".to_string(),
            superadmin: "/superadmin-api".to_string(),
        }
    }
}

impl RoutePrefixes {
    /// Classify a request path. After the public check the first match wins,
    /// in the order user-management, admin, superadmin.
    pub fn classify(&self, path: &str) -> RouteClass {
        if has_prefix(path, &self.public) {
            RouteClass::Public
        } else if has_prefix(path, &self.user_management) {
            RouteClass::UserManagement
        } else if has_prefix(path, &self.admin) {
            RouteClass::Admin
        } else if has_prefix(path, &self.superadmin) {
            RouteClass::SuperAdmin
        } else {
            RouteClass::Authenticated
        }
    }
}

/// Segment-aware prefix match: `/admin-api` matches `/admin-api` and
/// `/admin-api/x`, but not `/admin-apix`.
fn has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// POST, PUT, PATCH and DELETE.
pub fn is_mutating_method(method: &str) -> bool {
    matches!(
        method.to_ascii_uppercase().as_str(),
        "POST" | "PUT" | "PATCH" | "DELETE"
    )
}
