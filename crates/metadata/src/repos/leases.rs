//! Named exclusive lease repository trait.

use crate::error::MetadataResult;
use async_trait::async_trait;
use std::time::Duration;

/// Repository for named leases.
///
/// Acquisition is single-shot: it either takes the lease immediately or
/// reports contention; callers never block waiting for a lease to free up.
/// Expired leases are reclaimed on the next acquisition attempt, so a
/// crashed holder self-heals after the timeout.
#[async_trait]
pub trait LeaseRepo: Send + Sync {
    /// Try to take the named lease for `ttl`. Returns `false` when the lease
    /// is currently held.
    async fn try_acquire_lease(&self, key: &str, ttl: Duration) -> MetadataResult<bool>;

    /// Release the named lease. Releasing an unheld lease is not an error.
    async fn release_lease(&self, key: &str) -> MetadataResult<()>;
}
