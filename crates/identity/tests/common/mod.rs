//! Shared fixtures for the backend adapter tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use warden_core::{AuthError, AuthResult, TenantId};
use warden_identity::{ManagedCloudConfig, ProviderConfig, ProviderKind, SelfHostedConfig, Tenant, TenantDirectory};

pub const PROJECT: &str = "proj-1";
pub const API_KEY: &str = "public-key";
pub const ADMIN_TOKEN: &str = "admin-secret";

pub fn managed_cloud_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::managed_cloud(),
        managed_cloud: Some(ManagedCloudConfig {
            base_url: base_url.to_string(),
            api_key: API_KEY.to_string(),
            project_id: PROJECT.to_string(),
            admin_token: ADMIN_TOKEN.to_string(),
        }),
        self_hosted: None,
        backend_timeout: Duration::from_secs(5),
    }
}

pub fn self_hosted_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::self_hosted(),
        managed_cloud: None,
        self_hosted: Some(SelfHostedConfig {
            public_url: base_url.to_string(),
            admin_url: base_url.to_string(),
            admin_token: Some(ADMIN_TOKEN.to_string()),
            ui_url: "https://auth.example.com".to_string(),
            step_up_window: Duration::from_secs(600),
        }),
        backend_timeout: Duration::from_secs(5),
    }
}

/// Directory fake with an injectable insert failure.
#[derive(Default)]
pub struct MemoryDirectory {
    rows: Mutex<HashMap<TenantId, Tenant>>,
    fail_inserts: AtomicBool,
}

impl MemoryDirectory {
    pub fn failing_inserts() -> Self {
        let d = Self::default();
        d.fail_inserts.store(true, Ordering::SeqCst);
        d
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl TenantDirectory for MemoryDirectory {
    async fn insert(&self, tenant: &Tenant) -> AuthResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AuthError::store("insert failed"));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|t| t.subdomain == tenant.subdomain) {
            return Err(AuthError::already_exists("subdomain"));
        }
        rows.insert(tenant.tenant_id.clone(), tenant.clone());
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> AuthResult<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&tenant.tenant_id) {
            Some(row) => {
                *row = tenant.clone();
                Ok(())
            }
            None => Err(AuthError::TenantNotFound),
        }
    }

    async fn delete(&self, tenant_id: &TenantId) -> AuthResult<()> {
        self.rows
            .lock()
            .unwrap()
            .remove(tenant_id)
            .map(|_| ())
            .ok_or(AuthError::TenantNotFound)
    }

    async fn get(&self, tenant_id: &TenantId) -> AuthResult<Option<Tenant>> {
        Ok(self.rows.lock().unwrap().get(tenant_id).cloned())
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> AuthResult<Option<Tenant>> {
        Ok(self.rows.lock().unwrap().values().find(|t| t.subdomain == subdomain).cloned())
    }

    async fn list(&self) -> AuthResult<Vec<Tenant>> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }
}
