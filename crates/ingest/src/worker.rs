//! Asynchronous ingestion worker.
//!
//! Drains scheduler jobs and drives the pipeline: parse the stored publish
//! payload, then either deprecate matching versions or extract the manifest,
//! check coherence, and finalize the package. All failure modes converge
//! here: typed parse/extraction errors become service errors exactly once,
//! and the affected package and file rows are marked `error` so nothing
//! stays `processing` forever. Jobs are delivered at least once, so every
//! path re-checks persisted state before acting.

use crate::access::Authorizer;
use crate::archive::locate_manifest;
use crate::cache::MetadataCacheService;
use crate::coherence::check_manifest_coherence;
use crate::create::{CreatePackageService, CreatedPackage};
use crate::deprecate::DeprecatePackageService;
use crate::error::{ErrorReason, ServiceError, ServiceResult};
use crate::lease::LeaseProvider;
use crate::scheduler::{Job, JobScheduler};
use crate::telemetry::ErrorTracker;
use amphora_core::{PackageFileStatus, PackageManifest, PackageStatus, PublishRequest, RegistryConfig};
use amphora_metadata::MetadataStore;
use amphora_metadata::models::{PackageFileRow, PackageRow};
use amphora_metadata::repos::{MetadatumRepo, PackageFileRepo, PackageRepo};
use amphora_storage::ObjectStore;
use std::io::Cursor;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Result of processing one uploaded publish payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A package was created, verified, and finalized.
    Published { package_id: Uuid },
    /// Matching versions were deprecated.
    Deprecated { updated: usize },
    /// The file was already handled by an earlier delivery.
    AlreadyProcessed,
}

/// Background worker executing ingestion jobs.
pub struct IngestWorker {
    store: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    authorizer: Arc<dyn Authorizer>,
    scheduler: Arc<dyn JobScheduler>,
    tracker: Arc<dyn ErrorTracker>,
    config: Arc<RegistryConfig>,
    create: CreatePackageService,
    deprecate: DeprecatePackageService,
    cache: MetadataCacheService,
}

impl IngestWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        leases: Arc<dyn LeaseProvider>,
        authorizer: Arc<dyn Authorizer>,
        scheduler: Arc<dyn JobScheduler>,
        tracker: Arc<dyn ErrorTracker>,
        config: Arc<RegistryConfig>,
    ) -> Self {
        let create = CreatePackageService::new(
            store.clone(),
            objects.clone(),
            leases.clone(),
            tracker.clone(),
            config.clone(),
        );
        let deprecate = DeprecatePackageService::new(
            store.clone(),
            scheduler.clone(),
            tracker.clone(),
            config.clone(),
        );
        let cache =
            MetadataCacheService::new(store.clone(), objects.clone(), leases, config.clone());
        Self {
            store,
            objects,
            authorizer,
            scheduler,
            tracker,
            config,
            create,
            deprecate,
            cache,
        }
    }

    /// Drain jobs until the channel closes. Failures are logged and tracked;
    /// the loop never dies on a bad job.
    pub async fn run(self: Arc<Self>, mut jobs: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = jobs.recv().await {
            if let Err(error) = self.handle(job).await {
                tracing::warn!(error = %error, "ingest job failed");
            }
        }
    }

    /// Execute one job.
    pub async fn handle(&self, job: Job) -> ServiceResult<()> {
        match job {
            Job::ProcessPackageFile {
                file_id,
                user_id,
                deprecate,
            } => self
                .process_package_file(file_id, user_id, deprecate)
                .await
                .map(|_| ()),
            Job::RebuildMetadataCache {
                project_id,
                package_name,
            } => self.cache.execute(project_id, &package_name).await.map(|_| ()),
        }
    }

    /// Process one uploaded publish payload end to end.
    pub async fn process_package_file(
        &self,
        file_id: Uuid,
        user_id: Uuid,
        deprecate: bool,
    ) -> ServiceResult<ProcessOutcome> {
        let file = self
            .store
            .get_file(file_id)
            .await?
            .ok_or_else(|| ServiceError::internal(format!("package file {file_id} not found")))?;
        if file.status != PackageFileStatus::Processing.as_str() {
            // A prior delivery already settled this file.
            return Ok(ProcessOutcome::AlreadyProcessed);
        }
        let placeholder = self
            .store
            .get_package(file.package_id)
            .await?
            .ok_or_else(|| {
                ServiceError::internal(format!("package {} not found", file.package_id))
            })?;

        let payload = self.objects.get(&file.object_key).await?;

        match self
            .process_payload(&placeholder, &file, &payload, user_id, deprecate)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.tracker.track_exception(
                    &error,
                    &vec![
                        ("file_id", file_id.to_string()),
                        ("package_id", placeholder.package_id.to_string()),
                        ("package_name", placeholder.name.clone()),
                    ],
                );
                if let Err(mark) = self
                    .store
                    .fail_package(placeholder.package_id, file.file_id)
                    .await
                {
                    tracing::error!(
                        package_id = %placeholder.package_id,
                        error = %mark,
                        "failed to mark package as errored"
                    );
                }
                Err(error)
            }
        }
    }

    async fn process_payload(
        &self,
        placeholder: &PackageRow,
        file: &PackageFileRow,
        payload: &[u8],
        user_id: Uuid,
        deprecate: bool,
    ) -> ServiceResult<ProcessOutcome> {
        let request = PublishRequest::parse(payload)
            .map_err(|e| ServiceError::new(ErrorReason::JsonParserError, e.to_string()))?;

        if deprecate {
            self.run_deprecation(placeholder, file, &request, user_id).await
        } else {
            self.run_publish(placeholder, file, &request).await
        }
    }

    async fn run_deprecation(
        &self,
        placeholder: &PackageRow,
        file: &PackageFileRow,
        request: &PublishRequest,
        user_id: Uuid,
    ) -> ServiceResult<ProcessOutcome> {
        if request.versions.is_empty() {
            return Err(ServiceError::new(
                ErrorReason::MissingVersions,
                "payload contains no versions",
            ));
        }
        if request.deprecated_versions().next().is_none() {
            return Err(ServiceError::new(
                ErrorReason::MissingDeprecatedVersions,
                "no version in the payload carries a deprecated field",
            ));
        }

        let outcome = self
            .deprecate
            .execute(placeholder.project_id, request)
            .await?;

        self.store
            .update_file_status(file.file_id, PackageFileStatus::Default.as_str())
            .await?;
        if self
            .authorizer
            .can_destroy_package(user_id, placeholder.project_id)
            .await
        {
            // The actor may destroy packages, so the placeholder is cleaned
            // up once deprecation completes.
            self.store
                .update_package_status(
                    placeholder.package_id,
                    PackageStatus::PendingDestruction.as_str(),
                )
                .await?;
        }

        Ok(ProcessOutcome::Deprecated {
            updated: outcome.updated,
        })
    }

    async fn run_publish(
        &self,
        placeholder: &PackageRow,
        file: &PackageFileRow,
        request: &PublishRequest,
    ) -> ServiceResult<ProcessOutcome> {
        let created = self
            .create
            .execute(placeholder.project_id, request, PackageStatus::Processing)
            .await?;

        if let Err(error) = self.verify_and_finalize(&created).await {
            // The real package failed verification; record that on its rows
            // (the caller marks the placeholder).
            if let Err(mark) = self
                .store
                .fail_package(created.package_id, created.file_id)
                .await
            {
                tracing::error!(
                    package_id = %created.package_id,
                    error = %mark,
                    "failed to mark created package as errored"
                );
            }
            return Err(error);
        }

        // Settle the placeholder and refresh the published document.
        self.store
            .update_file_status(file.file_id, PackageFileStatus::Default.as_str())
            .await?;
        self.store
            .update_package_status(
                placeholder.package_id,
                PackageStatus::PendingDestruction.as_str(),
            )
            .await?;
        self.scheduler
            .enqueue(Job::RebuildMetadataCache {
                project_id: placeholder.project_id,
                package_name: created.name.clone(),
            })
            .await?;

        tracing::info!(
            package_id = %created.package_id,
            name = %created.name,
            version = %created.version,
            "package published"
        );

        Ok(ProcessOutcome::Published {
            package_id: created.package_id,
        })
    }

    /// Extract the embedded manifest, check coherence, and finalize.
    async fn verify_and_finalize(&self, created: &CreatedPackage) -> ServiceResult<()> {
        let mut cursor = Cursor::new(created.tarball.as_ref());
        let entry = locate_manifest(&mut cursor, self.config.max_manifest_entry_size)?;
        let manifest = PackageManifest::parse(&entry.contents)
            .map_err(|e| ServiceError::new(ErrorReason::JsonParserError, e.to_string()))?;

        let package = self
            .store
            .get_package(created.package_id)
            .await?
            .ok_or_else(|| {
                ServiceError::internal(format!("package {} not found", created.package_id))
            })?;
        let metadatum = self.store.get_metadatum(created.package_id).await?;

        check_manifest_coherence(&package, metadatum.as_ref(), &manifest)?;

        self.store
            .finalize_package(created.package_id, created.file_id)
            .await?;
        Ok(())
    }
}
