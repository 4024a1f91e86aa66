//! Registry metadata cache builder.
//!
//! Aggregates every current version of a package name into the npm
//! `GET /<pkg>` document and persists it as a cached object. Rebuilds are
//! serialized per name by a lease; a busy lease is a no-op because the
//! in-flight rebuild will produce an equally current result (the cache is
//! purely derivative, last writer wins). Output is byte-stable for a fixed
//! package set: every map serializes with sorted keys.

use crate::error::ServiceResult;
use crate::lease::{LeaseProvider, metadata_cache_lease_key};
use amphora_core::RegistryConfig;
use amphora_metadata::MetadataStore;
use amphora_metadata::models::{
    MetadataCacheRow, NpmMetadatumRow, PackageFileRow, PackageRow, TagRow,
};
use amphora_metadata::repos::{CacheRepo, PackageFileRepo, PackageRepo, TagRepo};
use amphora_storage::ObjectStore;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Result of one rebuild attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The cache was rebuilt and persisted.
    Rebuilt { size: u64 },
    /// Another rebuild holds the lease; nothing was written.
    LeaseBusy,
}

/// The npm registry document served for `GET /<pkg>`.
#[derive(Debug, Serialize)]
struct RegistryDocument {
    name: String,
    #[serde(rename = "dist-tags")]
    dist_tags: BTreeMap<String, String>,
    versions: BTreeMap<String, Value>,
}

/// Rebuilds cached registry metadata documents.
pub struct MetadataCacheService {
    store: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    leases: Arc<dyn LeaseProvider>,
    config: Arc<RegistryConfig>,
}

impl MetadataCacheService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        leases: Arc<dyn LeaseProvider>,
        config: Arc<RegistryConfig>,
    ) -> Self {
        Self {
            store,
            objects,
            leases,
            config,
        }
    }

    /// Rebuild the cache for `(project, package_name)`.
    pub async fn execute(
        &self,
        project_id: Uuid,
        package_name: &str,
    ) -> ServiceResult<CacheOutcome> {
        let lease_key = metadata_cache_lease_key(&project_id, package_name);
        if !self
            .leases
            .try_obtain(&lease_key, self.config.lease_timeout())
            .await?
        {
            tracing::debug!(
                project_id = %project_id,
                package_name = %package_name,
                "cache rebuild already in flight"
            );
            return Ok(CacheOutcome::LeaseBusy);
        }

        let result = self.rebuild_locked(project_id, package_name).await;

        if let Err(error) = self.leases.release(&lease_key).await {
            tracing::warn!(key = %lease_key, error = %error, "failed to release cache lease");
        }

        result
    }

    async fn rebuild_locked(
        &self,
        project_id: Uuid,
        package_name: &str,
    ) -> ServiceResult<CacheOutcome> {
        let packages = self
            .store
            .list_current_by_name(project_id, package_name)
            .await?;
        let package_ids: Vec<Uuid> = packages.iter().map(|p| p.package_id).collect();
        let with_metadata = self.store.get_packages_with_metadata(&package_ids).await?;
        let files = self.store.list_files_for_packages(&package_ids).await?;
        let tags = self.store.list_tags(project_id, package_name, "npm").await?;

        let document = build_registry_document(
            package_name,
            &with_metadata,
            &files,
            &tags,
            &self.config.base_url,
        );
        let bytes = serde_json::to_vec(&document)?;
        let size = bytes.len() as i64;

        let object_key = cache_object_key(&project_id, package_name);
        self.objects.put(&object_key, bytes.into()).await?;

        // Find-or-build, then overwrite in place.
        let now = OffsetDateTime::now_utc();
        let existing = self.store.get_cache(project_id, package_name).await?;
        let row = MetadataCacheRow {
            cache_id: existing
                .as_ref()
                .map(|c| c.cache_id)
                .unwrap_or_else(Uuid::new_v4),
            project_id,
            package_name: package_name.to_string(),
            object_key,
            size,
            created_at: existing.as_ref().map(|c| c.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.store.upsert_cache(&row).await?;

        tracing::info!(
            project_id = %project_id,
            package_name = %package_name,
            size,
            versions = document.versions.len(),
            "metadata cache rebuilt"
        );

        Ok(CacheOutcome::Rebuilt { size: size as u64 })
    }
}

fn build_registry_document(
    package_name: &str,
    packages: &[(PackageRow, Option<NpmMetadatumRow>)],
    files: &[PackageFileRow],
    tags: &[TagRow],
    base_url: &str,
) -> RegistryDocument {
    let file_by_package: HashMap<Uuid, &PackageFileRow> =
        files.iter().map(|f| (f.package_id, f)).collect();
    let version_by_package: HashMap<Uuid, &str> = packages
        .iter()
        .map(|(p, _)| (p.package_id, p.version.as_str()))
        .collect();

    let mut versions = BTreeMap::new();
    for (package, metadatum) in packages {
        let mut manifest: Map<String, Value> = metadatum
            .as_ref()
            .and_then(|m| serde_json::from_str(&m.package_json).ok())
            .unwrap_or_default();
        manifest
            .entry("name".to_string())
            .or_insert_with(|| Value::String(package.name.clone()));
        manifest
            .entry("version".to_string())
            .or_insert_with(|| Value::String(package.version.clone()));

        if let Some(file) = file_by_package.get(&package.package_id) {
            manifest.insert(
                "dist".to_string(),
                serde_json::json!({
                    "shasum": file.file_sha1,
                    "tarball": format!("{base_url}/{package_name}/-/{}", file.file_name),
                }),
            );
        }

        versions.insert(package.version.clone(), Value::Object(manifest));
    }

    // A tag pointing at a package outside the current set is stale; drop it.
    let dist_tags = tags
        .iter()
        .filter_map(|tag| {
            version_by_package
                .get(&tag.package_id)
                .map(|version| (tag.tag_name.clone(), version.to_string()))
        })
        .collect();

    RegistryDocument {
        name: package_name.to_string(),
        dist_tags,
        versions,
    }
}

fn cache_object_key(project_id: &Uuid, package_name: &str) -> String {
    // Scoped package names contain `/`; key by digest instead.
    let mut digest = Sha256::new();
    digest.update(package_name.as_bytes());
    let hex: String = digest
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!(
        "metadata_caches/{}/{}/{}.json",
        project_id,
        &hex[..2],
        hex
    )
}
