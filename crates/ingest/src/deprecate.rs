//! Batch deprecation processing.
//!
//! Scans a project's packages matching the payload's name and versions in
//! fixed-size batches, rewrites each metadatum's `deprecated` field, and
//! moves package statuses accordingly. Batches bound transaction and lock
//! scope; each batch commits independently, and the batch boundary is the
//! cooperative-cancellation point for long runs.

use crate::error::ServiceResult;
use crate::scheduler::{Job, JobScheduler};
use crate::telemetry::ErrorTracker;
use amphora_core::{PackageStatus, PublishRequest, RegistryConfig};
use amphora_metadata::MetadataStore;
use amphora_metadata::models::{NpmMetadatumRow, PackageRow, StatusGroup};
use amphora_metadata::repos::{MetadatumRepo, PackageRepo};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Summary of one deprecation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeprecationOutcome {
    /// Packages whose metadatum and status were rewritten.
    pub updated: usize,
    /// Whether a cache refresh was enqueued (exactly one per changed run).
    pub cache_refresh_enqueued: bool,
}

/// Applies deprecation payloads to existing packages.
pub struct DeprecatePackageService {
    store: Arc<dyn MetadataStore>,
    scheduler: Arc<dyn JobScheduler>,
    tracker: Arc<dyn ErrorTracker>,
    config: Arc<RegistryConfig>,
}

impl DeprecatePackageService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        scheduler: Arc<dyn JobScheduler>,
        tracker: Arc<dyn ErrorTracker>,
        config: Arc<RegistryConfig>,
    ) -> Self {
        Self {
            store,
            scheduler,
            tracker,
            config,
        }
    }

    /// Process the payload's versions against the project's packages.
    ///
    /// Idempotent: a second run with the same payload finds every package
    /// already in the requested state and writes nothing.
    pub async fn execute(
        &self,
        project_id: Uuid,
        request: &PublishRequest,
    ) -> ServiceResult<DeprecationOutcome> {
        let versions: Vec<String> = request.versions.keys().cloned().collect();
        let package_ids = self
            .store
            .list_ids_by_name_and_versions(project_id, &request.name, &versions)
            .await?;

        let batch_size = self.config.deprecation_batch_size.max(1);
        let mut updated = 0;

        for batch in package_ids.chunks(batch_size) {
            let rows = self.store.get_packages_with_metadata(batch).await?;
            let (metadata, status_groups) = self.plan_batch(request, &rows);
            if metadata.is_empty() {
                continue;
            }
            self.store
                .apply_deprecation_batch(&metadata, &status_groups)
                .await?;
            updated += metadata.len();
        }

        // One refresh for the whole run, not one per batch.
        let cache_refresh_enqueued = updated > 0;
        if cache_refresh_enqueued {
            self.scheduler
                .enqueue(Job::RebuildMetadataCache {
                    project_id,
                    package_name: request.name.clone(),
                })
                .await?;
            tracing::info!(
                project_id = %project_id,
                package_name = %request.name,
                updated,
                "deprecation applied"
            );
        }

        Ok(DeprecationOutcome {
            updated,
            cache_refresh_enqueued,
        })
    }

    /// Compute the metadatum rows and status groups for one batch.
    fn plan_batch(
        &self,
        request: &PublishRequest,
        rows: &[(PackageRow, Option<NpmMetadatumRow>)],
    ) -> (Vec<NpmMetadatumRow>, Vec<StatusGroup>) {
        let now = OffsetDateTime::now_utc();
        let mut metadata = Vec::new();
        let mut groups: BTreeMap<&'static str, Vec<Uuid>> = BTreeMap::new();

        for (package, metadatum) in rows {
            let Some(fragment) = request.versions.get(&package.version) else {
                continue;
            };
            // No `deprecated` key at all: nothing to do for this version.
            let Some(message) = fragment.deprecated.as_deref() else {
                continue;
            };

            // Base document: the stored metadatum, or the incoming fragment
            // for packages that never had one.
            let mut document = metadatum
                .as_ref()
                .and_then(|m| serde_json::from_str::<Map<String, Value>>(&m.package_json).ok())
                .unwrap_or_else(|| {
                    fragment
                        .filtered()
                        .to_value()
                        .as_object()
                        .cloned()
                        .unwrap_or_default()
                });

            let existing = document.get("deprecated").and_then(Value::as_str);
            if deprecation_state_unchanged(existing, message) {
                continue;
            }

            let target = if message.is_empty() {
                document.remove("deprecated");
                PackageStatus::Default
            } else {
                document.insert("deprecated".to_string(), Value::String(message.to_string()));
                PackageStatus::Deprecated
            };

            let package_json = Value::Object(document).to_string();
            if package_json.len() > self.config.max_metadata_json_size {
                // One invalid package must not abort its batch siblings.
                self.tracker.track_exception(
                    &format!(
                        "npm metadatum size {} exceeds maximum of {}",
                        package_json.len(),
                        self.config.max_metadata_json_size
                    ),
                    &vec![
                        ("package_name", package.name.clone()),
                        ("package_version", package.version.clone()),
                    ],
                );
                continue;
            }

            let scripts = metadatum
                .as_ref()
                .map(|m| m.package_json_scripts.clone())
                .unwrap_or_else(|| "{}".to_string());

            metadata.push(NpmMetadatumRow {
                package_id: package.package_id,
                package_json,
                package_json_scripts: scripts,
                created_at: metadatum.as_ref().map(|m| m.created_at).unwrap_or(now),
                updated_at: now,
            });
            groups
                .entry(target.as_str())
                .or_default()
                .push(package.package_id);
        }

        let status_groups = groups
            .into_iter()
            .map(|(status, package_ids)| StatusGroup {
                status: status.to_string(),
                package_ids,
            })
            .collect();
        (metadata, status_groups)
    }
}

/// `None` and `""` are both "not deprecated"; identical messages are a no-op.
///
/// The nil/empty equivalence suppresses needless writes (and the cache churn
/// they would trigger) when a payload "un-deprecates" a package that was
/// never deprecated.
fn deprecation_state_unchanged(existing: Option<&str>, incoming: &str) -> bool {
    let existing_empty = existing.is_none_or(str::is_empty);
    (existing_empty && incoming.is_empty()) || existing == Some(incoming)
}
