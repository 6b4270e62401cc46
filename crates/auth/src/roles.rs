use core::str::FromStr;

use serde::{Deserialize, Serialize};

use warden_core::AuthError;

/// Tenant-scoped role.
///
/// Ordered by privilege: `Admin > CustomerAdmin > User`. A higher role
/// satisfies every "minimum role" check a lower one satisfies.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantRole {
    User,
    CustomerAdmin,
    Admin,
}

impl TenantRole {
    pub const ALL: [TenantRole; 3] = [TenantRole::User, TenantRole::CustomerAdmin, TenantRole::Admin];

    pub fn rank(&self) -> u8 {
        match self {
            TenantRole::User => 1,
            TenantRole::CustomerAdmin => 2,
            TenantRole::Admin => 3,
        }
    }

    /// Whether this role meets a minimum-role requirement.
    pub fn satisfies(&self, minimum: TenantRole) -> bool {
        self.rank() >= minimum.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenantRole::User => "USER",
            TenantRole::CustomerAdmin => "CUSTOMER_ADMIN",
            TenantRole::Admin => "ADMIN",
        }
    }
}

impl core::fmt::Display for TenantRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenantRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(TenantRole::User),
            "CUSTOMER_ADMIN" => Ok(TenantRole::CustomerAdmin),
            "ADMIN" => Ok(TenantRole::Admin),
            other => Err(AuthError::invalid(format!("unknown tenant role '{other}'"))),
        }
    }
}

/// Role not tied to any tenant.
///
/// `SuperAdmin` is the global-bypass role: it satisfies every tenant-scoped and
/// global check, including requests with no tenant context at all.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlobalRole {
    SuperAdmin,
}

impl GlobalRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlobalRole::SuperAdmin => "SUPER_ADMIN",
        }
    }
}

impl core::fmt::Display for GlobalRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GlobalRole {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Ok(GlobalRole::SuperAdmin),
            other => Err(AuthError::invalid(format!("unknown global role '{other}'"))),
        }
    }
}
