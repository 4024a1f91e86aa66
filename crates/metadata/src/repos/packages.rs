//! Package repository trait.

use crate::error::MetadataResult;
use crate::models::{NpmMetadatumRow, PackageBundle, PackageFileRow, PackageRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for package rows and their atomic creation paths.
#[async_trait]
pub trait PackageRepo: Send + Sync {
    /// Create a package together with its file, dependencies, dist-tag, and
    /// metadatum in one transaction. Fails with `AlreadyExists` when a
    /// current package with the same identity exists.
    async fn create_package_with_assets(&self, bundle: &PackageBundle) -> MetadataResult<()>;

    /// Create a placeholder package and its file only, in one transaction.
    async fn create_package_with_file(
        &self,
        package: &PackageRow,
        file: &PackageFileRow,
    ) -> MetadataResult<()>;

    /// Get a package by ID.
    async fn get_package(&self, package_id: Uuid) -> MetadataResult<Option<PackageRow>>;

    /// Find the current (non-pending-destruction) package for an exact
    /// identity.
    async fn find_current_package(
        &self,
        project_id: Uuid,
        name: &str,
        version: &str,
    ) -> MetadataResult<Option<PackageRow>>;

    /// All current packages for a name, ordered by version string.
    async fn list_current_by_name(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> MetadataResult<Vec<PackageRow>>;

    /// Ids of current packages matching a name and any of the given versions,
    /// in a stable order suitable for batching.
    async fn list_ids_by_name_and_versions(
        &self,
        project_id: Uuid,
        name: &str,
        versions: &[String],
    ) -> MetadataResult<Vec<Uuid>>;

    /// Packages with their metadata preloaded, for one batch of ids.
    async fn get_packages_with_metadata(
        &self,
        package_ids: &[Uuid],
    ) -> MetadataResult<Vec<(PackageRow, Option<NpmMetadatumRow>)>>;

    /// Update a package's status.
    async fn update_package_status(&self, package_id: Uuid, status: &str) -> MetadataResult<()>;

    /// Transition a package and its file to `default` in one transaction.
    async fn finalize_package(&self, package_id: Uuid, file_id: Uuid) -> MetadataResult<()>;

    /// Transition a package and its file to `error` in one transaction.
    async fn fail_package(&self, package_id: Uuid, file_id: Uuid) -> MetadataResult<()>;
}
