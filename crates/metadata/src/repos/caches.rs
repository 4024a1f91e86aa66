//! Metadata cache repository trait.

use crate::error::MetadataResult;
use crate::models::MetadataCacheRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for cached registry metadata documents.
#[async_trait]
pub trait CacheRepo: Send + Sync {
    /// Get the cache row for a `(project, package_name)` key.
    async fn get_cache(
        &self,
        project_id: Uuid,
        package_name: &str,
    ) -> MetadataResult<Option<MetadataCacheRow>>;

    /// Insert the cache row, or overwrite the existing row for the same key.
    async fn upsert_cache(&self, cache: &MetadataCacheRow) -> MetadataResult<()>;
}
