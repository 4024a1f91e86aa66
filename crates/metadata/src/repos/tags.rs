//! Dist-tag repository trait.

use crate::error::MetadataResult;
use crate::models::TagRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for dist-tag pointers.
#[async_trait]
pub trait TagRepo: Send + Sync {
    /// Insert the tag, or re-point the existing row for the same
    /// `(project, package_name, package_type, tag_name)` scope.
    async fn upsert_tag(&self, tag: &TagRow) -> MetadataResult<()>;

    /// All tags within a `(project, package_name, package_type)` scope.
    async fn list_tags(
        &self,
        project_id: Uuid,
        package_name: &str,
        package_type: &str,
    ) -> MetadataResult<Vec<TagRow>>;
}
