//! Dependency repository trait.

use crate::error::MetadataResult;
use crate::models::DependencyRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for declared package dependencies. Writes happen inside the
/// package-creation transaction; this trait covers reads.
#[async_trait]
pub trait DependencyRepo: Send + Sync {
    /// Dependencies declared by a package.
    async fn list_dependencies(&self, package_id: Uuid) -> MetadataResult<Vec<DependencyRow>>;
}
