//! Distributed lease provider.
//!
//! Serializes cross-process mutations: at most one in-flight create per
//! exact package identity, at most one cache rebuild per name. Acquisition
//! is single-shot (callers fail fast instead of waiting) and expiry is the
//! liveness backstop when a holder crashes. The lease is an injected
//! dependency so tests can substitute a deterministic provider.

use crate::error::LeaseError;
use amphora_metadata::MetadataStore;
use amphora_metadata::repos::LeaseRepo;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Named exclusive lease provider.
#[async_trait]
pub trait LeaseProvider: Send + Sync {
    /// Try to take the named lease for `ttl`. Returns `false` when the lease
    /// is currently held elsewhere.
    async fn try_obtain(&self, key: &str, ttl: Duration) -> Result<bool, LeaseError>;

    /// Release the named lease.
    async fn release(&self, key: &str) -> Result<(), LeaseError>;
}

/// Lease key serializing creates for one exact `(project, name, version)`.
pub fn create_package_lease_key(project_id: &Uuid, name: &str, version: &str) -> String {
    format!("amphora:packages:npm:create:{project_id}:{name}:{version}")
}

/// Lease key serializing cache rebuilds for one `(project, name)`.
pub fn metadata_cache_lease_key(project_id: &Uuid, name: &str) -> String {
    format!("amphora:packages:npm:metadata_cache:{project_id}:{name}")
}

/// Lease provider backed by the metadata store's lease table. Works across
/// processes sharing the database.
pub struct StoreLeaseProvider {
    store: Arc<dyn MetadataStore>,
}

impl StoreLeaseProvider {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LeaseProvider for StoreLeaseProvider {
    async fn try_obtain(&self, key: &str, ttl: Duration) -> Result<bool, LeaseError> {
        self.store
            .try_acquire_lease(key, ttl)
            .await
            .map_err(|e| LeaseError(e.to_string()))
    }

    async fn release(&self, key: &str) -> Result<(), LeaseError> {
        self.store
            .release_lease(key)
            .await
            .map_err(|e| LeaseError(e.to_string()))
    }
}

/// In-memory lease provider for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryLeaseProvider {
    held: Mutex<HashMap<String, Instant>>,
}

impl InMemoryLeaseProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseProvider for InMemoryLeaseProvider {
    async fn try_obtain(&self, key: &str, ttl: Duration) -> Result<bool, LeaseError> {
        let mut held = self.held.lock().await;
        let now = Instant::now();
        held.retain(|_, expires_at| *expires_at > now);
        if held.contains_key(key) {
            return Ok(false);
        }
        held.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn release(&self, key: &str) -> Result<(), LeaseError> {
        self.held.lock().await.remove(key);
        Ok(())
    }
}
