//! npm metadatum repository trait.

use crate::error::MetadataResult;
use crate::models::{NpmMetadatumRow, StatusGroup};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for npm metadata rows.
#[async_trait]
pub trait MetadatumRepo: Send + Sync {
    /// Get the metadatum for a package.
    async fn get_metadatum(&self, package_id: Uuid) -> MetadataResult<Option<NpmMetadatumRow>>;

    /// Insert or update a single metadatum.
    async fn upsert_metadatum(&self, metadatum: &NpmMetadatumRow) -> MetadataResult<()>;

    /// One deprecation batch: bulk-upsert the metadata rows, then apply each
    /// status group as one bulk package update, all in one transaction.
    async fn apply_deprecation_batch(
        &self,
        metadata: &[NpmMetadatumRow],
        status_groups: &[StatusGroup],
    ) -> MetadataResult<()>;
}
