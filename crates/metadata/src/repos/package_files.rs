//! Package file repository trait.

use crate::error::MetadataResult;
use crate::models::PackageFileRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for package file rows.
#[async_trait]
pub trait PackageFileRepo: Send + Sync {
    /// Get a file by ID.
    async fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<PackageFileRow>>;

    /// Update a file's status.
    async fn update_file_status(&self, file_id: Uuid, status: &str) -> MetadataResult<()>;

    /// Files owned by any of the given packages.
    async fn list_files_for_packages(
        &self,
        package_ids: &[Uuid],
    ) -> MetadataResult<Vec<PackageFileRow>>;
}
