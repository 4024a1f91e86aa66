//! Package creation pipeline.
//!
//! Validates upload parameters, serializes concurrent creates for the same
//! identity behind a named lease, and writes the package with all of its
//! owned rows in one transaction. The lease is a liveness guarantee (it
//! prevents wasted duplicate work); the store's unique constraint is the
//! correctness backstop.

use crate::error::{ErrorReason, ServiceError, ServiceResult};
use crate::lease::{LeaseProvider, create_package_lease_key};
use crate::telemetry::ErrorTracker;
use amphora_core::{
    Attachment, PackageFileStatus, PackageManifest, PackageStatus, PackageType, PublishRequest,
    RegistryConfig,
};
use amphora_metadata::MetadataStore;
use amphora_metadata::models::{
    DependencyRow, NpmMetadatumRow, PackageBundle, PackageFileRow, PackageRow,
};
use amphora_metadata::repos::PackageRepo;
use amphora_storage::ObjectStore;
use bytes::Bytes;
use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// A successfully created package.
#[derive(Clone, Debug)]
pub struct CreatedPackage {
    pub package_id: Uuid,
    pub file_id: Uuid,
    pub name: String,
    pub version: String,
    /// Decoded tarball bytes, passed along so downstream extraction does not
    /// decode the attachment a second time.
    pub tarball: Bytes,
}

/// Creates npm packages from publish requests.
pub struct CreatePackageService {
    store: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    leases: Arc<dyn LeaseProvider>,
    tracker: Arc<dyn ErrorTracker>,
    config: Arc<RegistryConfig>,
}

impl CreatePackageService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        leases: Arc<dyn LeaseProvider>,
        tracker: Arc<dyn ErrorTracker>,
        config: Arc<RegistryConfig>,
    ) -> Self {
        Self {
            store,
            objects,
            leases,
            tracker,
            config,
        }
    }

    /// Validate and create the package with all owned rows.
    ///
    /// Validation short-circuits in order: blank version, duplicate current
    /// package, oversized file. The file size is computed analytically from
    /// the base64 length, so nothing is decoded before the checks pass.
    pub async fn execute(
        &self,
        project_id: Uuid,
        request: &PublishRequest,
        status: PackageStatus,
    ) -> ServiceResult<CreatedPackage> {
        let (version, manifest) = request
            .lead_version()
            .ok_or_else(|| ServiceError::new(ErrorReason::VersionEmpty, "version is empty"))?;
        if version.trim().is_empty() {
            return Err(ServiceError::new(
                ErrorReason::VersionEmpty,
                "version is empty",
            ));
        }

        if self
            .store
            .find_current_package(project_id, &request.name, version)
            .await?
            .is_some()
        {
            return Err(ServiceError::new(
                ErrorReason::PackageAlreadyExists,
                format!("package {}@{} already exists", request.name, version),
            ));
        }

        let attachment = request.tarball_attachment(version).ok_or_else(|| {
            ServiceError::new(
                ErrorReason::AttachmentMissing,
                format!("attachment {}-{}.tgz missing", request.name, version),
            )
        })?;
        let size = attachment.decoded_size();
        if size > self.config.max_file_size {
            return Err(ServiceError::new(
                ErrorReason::FileTooLarge,
                format!(
                    "file size {size} exceeds maximum of {}",
                    self.config.max_file_size
                ),
            ));
        }

        let lease_key = create_package_lease_key(&project_id, &request.name, version);
        if !self
            .leases
            .try_obtain(&lease_key, self.config.lease_timeout())
            .await?
        {
            return Err(ServiceError::new(
                ErrorReason::CouldNotObtainLease,
                "another publish for this package version is in flight",
            ));
        }

        let result = self
            .create_locked(project_id, request, version, manifest, attachment, status)
            .await;

        if let Err(error) = self.leases.release(&lease_key).await {
            tracing::warn!(key = %lease_key, error = %error, "failed to release create lease");
        }

        result
    }

    async fn create_locked(
        &self,
        project_id: Uuid,
        request: &PublishRequest,
        version: &str,
        manifest: &PackageManifest,
        attachment: &Attachment,
        status: PackageStatus,
    ) -> ServiceResult<CreatedPackage> {
        let tarball = Bytes::from(attachment.decode().map_err(|e| {
            ServiceError::new(ErrorReason::InvalidAttachment, e.to_string())
        })?);

        let package_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let file_sha1 = hex_digest(Sha1::new(), &tarball);
        let file_sha256 = hex_digest(Sha256::new(), &tarball);
        let object_key = tarball_object_key(&project_id, &file_sha256);

        let metadatum = self.build_metadatum(package_id, request, version, manifest, now)?;

        let file_status = match status {
            PackageStatus::Processing => PackageFileStatus::Processing,
            _ => PackageFileStatus::Default,
        };

        let bundle = PackageBundle {
            package: PackageRow {
                package_id,
                project_id,
                package_type: PackageType::Npm.as_str().to_string(),
                name: request.name.clone(),
                version: version.to_string(),
                status: status.as_str().to_string(),
                created_at: now,
                updated_at: now,
            },
            file: PackageFileRow {
                file_id,
                package_id,
                file_name: format!("{}-{}.tgz", request.name, version),
                object_key: object_key.clone(),
                size: tarball.len() as i64,
                file_sha1,
                file_sha256,
                content_type: "application/octet-stream".to_string(),
                status: file_status.as_str().to_string(),
                created_at: now,
                updated_at: now,
            },
            dependencies: dependency_rows(package_id, manifest),
            dist_tag: request.lead_dist_tag().map(|(tag, _)| tag.to_string()),
            metadatum: Some(metadatum),
        };

        self.objects.put(&object_key, tarball.clone()).await?;

        if let Err(error) = self.store.create_package_with_assets(&bundle).await {
            // The transaction rolled back; drop the orphaned object too.
            if let Err(cleanup) = self.objects.delete(&object_key).await {
                tracing::warn!(key = %object_key, error = %cleanup, "failed to delete orphaned object");
            }
            return Err(error.into());
        }

        tracing::info!(
            package_id = %package_id,
            name = %request.name,
            version = %version,
            status = %status,
            "package created"
        );

        Ok(CreatedPackage {
            package_id,
            file_id,
            name: request.name.clone(),
            version: version.to_string(),
            tarball,
        })
    }

    /// Build the filtered metadatum row, enforcing the size bound.
    ///
    /// On oversize, field-size diagnostics go to the error tracker first,
    /// then the failure propagates untouched; telemetry never changes
    /// control flow.
    fn build_metadatum(
        &self,
        package_id: Uuid,
        request: &PublishRequest,
        version: &str,
        manifest: &PackageManifest,
        now: OffsetDateTime,
    ) -> ServiceResult<NpmMetadatumRow> {
        let document = manifest.filtered().to_value();
        let package_json = document.to_string();
        let package_json_scripts = serde_json::to_string(&manifest.scripts)?;

        if package_json.len() > self.config.max_metadata_json_size {
            let fields = largest_fields(
                &document,
                self.config.diagnostic_field_count,
                self.config.diagnostic_min_field_size,
            );
            self.tracker.track_exception(
                &format!(
                    "npm metadatum size {} exceeds maximum of {}",
                    package_json.len(),
                    self.config.max_metadata_json_size
                ),
                &vec![
                    ("package_name", request.name.clone()),
                    ("package_version", version.to_string()),
                    ("field_sizes", format!("{fields:?}")),
                ],
            );
            return Err(ServiceError::new(
                ErrorReason::MetadataTooLarge,
                format!(
                    "package.json metadata size {} exceeds maximum of {}",
                    package_json.len(),
                    self.config.max_metadata_json_size
                ),
            ));
        }

        Ok(NpmMetadatumRow {
            package_id,
            package_json,
            package_json_scripts,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Serialized sizes of the most interesting manifest fields: every field
/// over `min_size`, or when none qualify, the largest `count` overall.
pub(crate) fn largest_fields(
    document: &Value,
    count: usize,
    min_size: usize,
) -> Vec<(String, usize)> {
    let Some(map) = document.as_object() else {
        return Vec::new();
    };

    let mut sizes: Vec<(String, usize)> = map
        .iter()
        .map(|(field, value)| (field.clone(), value.to_string().len()))
        .collect();
    sizes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let over_threshold: Vec<(String, usize)> = sizes
        .iter()
        .filter(|(_, size)| *size > min_size)
        .take(count)
        .cloned()
        .collect();
    if over_threshold.is_empty() {
        sizes.truncate(count);
        sizes
    } else {
        over_threshold
    }
}

fn dependency_rows(package_id: Uuid, manifest: &PackageManifest) -> Vec<DependencyRow> {
    manifest
        .dependency_groups()
        .into_iter()
        .flat_map(|(kind, dependencies)| {
            dependencies.iter().map(move |(name, version_pattern)| DependencyRow {
                package_id,
                dependency_type: kind.as_str().to_string(),
                name: name.clone(),
                version_pattern: version_pattern.clone(),
            })
        })
        .collect()
}

fn tarball_object_key(project_id: &Uuid, sha256: &str) -> String {
    format!(
        "packages/{}/{}/{}/{}.tgz",
        project_id,
        &sha256[..2],
        &sha256[2..4],
        sha256
    )
}

fn hex_digest<D: Digest>(mut digest: D, data: &[u8]) -> String {
    digest.update(data);
    digest
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
