//! Temporary-package orchestration.
//!
//! Entry point for deploy-token/async publish flows, where the tarball
//! arrives before its manifest-derived identity can be trusted. A
//! placeholder package anchors the uploaded bytes; everything else happens
//! on the worker. The placeholder's version is synthetic and unique, so it
//! never collides with a real publish.

use crate::access::{Authorizer, PackagePolicy};
use crate::error::{ErrorReason, ServiceError, ServiceResult};
use crate::scheduler::{Job, JobScheduler};
use amphora_core::{PackageFileStatus, PackageStatus, PackageType};
use amphora_metadata::MetadataStore;
use amphora_metadata::models::{PackageFileRow, PackageRow};
use amphora_metadata::repos::PackageRepo;
use amphora_storage::ObjectStore;
use bytes::Bytes;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// A created placeholder package.
#[derive(Clone, Debug)]
pub struct TemporaryPackage {
    pub package_id: Uuid,
    pub file_id: Uuid,
    pub version: String,
}

/// Creates placeholder packages and hands off to asynchronous processing.
pub struct TemporaryPackageService {
    store: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    authorizer: Arc<dyn Authorizer>,
    policy: Arc<dyn PackagePolicy>,
    scheduler: Arc<dyn JobScheduler>,
}

impl TemporaryPackageService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        authorizer: Arc<dyn Authorizer>,
        policy: Arc<dyn PackagePolicy>,
        scheduler: Arc<dyn JobScheduler>,
    ) -> Self {
        Self {
            store,
            objects,
            authorizer,
            policy,
            scheduler,
        }
    }

    /// Create the placeholder package and file, then enqueue the worker.
    ///
    /// Authorization and protection checks fail closed before anything is
    /// written. The worker handoff happens after the transaction commits and
    /// carries only durable identifiers.
    pub async fn execute(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        package_name: &str,
        body: Bytes,
        deprecate: bool,
    ) -> ServiceResult<TemporaryPackage> {
        if !self
            .authorizer
            .can_create_package(user_id, project_id)
            .await
        {
            return Err(ServiceError::new(
                ErrorReason::Unauthorized,
                "not allowed to create packages in this project",
            ));
        }
        if self
            .policy
            .package_protected(package_name, PackageType::Npm)
            .await
        {
            return Err(ServiceError::new(
                ErrorReason::PackageProtected,
                format!("package name {package_name} is protected"),
            ));
        }

        let package_id = Uuid::new_v4();
        let file_id = Uuid::new_v4();
        let token = Uuid::new_v4();
        let version = format!("0.0.0-{token}");
        let now = OffsetDateTime::now_utc();

        let file_sha1 = hex_digest(Sha1::new(), &body);
        let file_sha256 = hex_digest(Sha256::new(), &body);
        let object_key = format!("uploads/{project_id}/{token}.json");

        let package = PackageRow {
            package_id,
            project_id,
            package_type: PackageType::Npm.as_str().to_string(),
            name: package_name.to_string(),
            version: version.clone(),
            status: PackageStatus::Processing.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let file = PackageFileRow {
            file_id,
            package_id,
            file_name: format!("npm-publish-{token}.json"),
            object_key: object_key.clone(),
            size: body.len() as i64,
            file_sha1,
            file_sha256,
            content_type: "application/json".to_string(),
            status: PackageFileStatus::Processing.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.objects.put(&object_key, body).await?;
        if let Err(error) = self.store.create_package_with_file(&package, &file).await {
            if let Err(cleanup) = self.objects.delete(&object_key).await {
                tracing::warn!(key = %object_key, error = %cleanup, "failed to delete orphaned upload");
            }
            return Err(error.into());
        }

        // Post-commit handoff: only durable identifiers cross the boundary.
        self.scheduler
            .enqueue(Job::ProcessPackageFile {
                file_id,
                user_id,
                deprecate,
            })
            .await?;

        tracing::info!(
            package_id = %package_id,
            package_name = %package_name,
            deprecate,
            "temporary package created"
        );

        Ok(TemporaryPackage {
            package_id,
            file_id,
            version,
        })
    }
}

fn hex_digest<D: Digest>(mut digest: D, data: &[u8]) -> String {
    digest.update(data);
    digest
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
