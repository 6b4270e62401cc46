//! The relational stores owned by this layer, bundled for the composition root.

use std::sync::Arc;

use sqlx::PgPool;

use warden_identity::TenantDirectory;

use crate::api_tokens::{ApiTokenStore, InMemoryApiTokenStore, PostgresApiTokenStore};
use crate::membership::{InMemoryMembershipStore, MembershipStore, PostgresMembershipStore};
use crate::tenants::{InMemoryTenantDirectory, PostgresTenantDirectory};

#[derive(Clone)]
pub struct Stores {
    pub directory: Arc<dyn TenantDirectory>,
    pub memberships: Arc<dyn MembershipStore>,
    pub api_tokens: Arc<dyn ApiTokenStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            directory: InMemoryTenantDirectory::arc(),
            memberships: InMemoryMembershipStore::arc(),
            api_tokens: InMemoryApiTokenStore::arc(),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            directory: Arc::new(PostgresTenantDirectory::new(pool.clone())),
            memberships: Arc::new(PostgresMembershipStore::new(pool.clone())),
            api_tokens: Arc::new(PostgresApiTokenStore::new(pool)),
        }
    }
}
