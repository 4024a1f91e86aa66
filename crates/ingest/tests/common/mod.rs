//! Shared fixtures for ingestion pipeline tests.

// Each test binary compiles common/ separately, so helpers unused by one
// binary are expected.
#![allow(dead_code)]

use amphora_core::{PublishRequest, RegistryConfig};
use amphora_ingest::{
    AllowAll, Authorizer, CreatePackageService, DeprecatePackageService, IngestWorker,
    InMemoryLeaseProvider, MetadataCacheService, PackagePolicy, ProtectedPatterns,
    RecordingScheduler, RecordingTracker, TemporaryPackageService,
};
use amphora_metadata::SqliteStore;
use amphora_storage::MemoryBackend;
use base64::{Engine as _, engine::general_purpose};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub objects: Arc<MemoryBackend>,
    pub leases: Arc<InMemoryLeaseProvider>,
    pub scheduler: Arc<RecordingScheduler>,
    pub tracker: Arc<RecordingTracker>,
    pub config: Arc<RegistryConfig>,
    pub worker: Arc<IngestWorker>,
    pub orchestrator: TemporaryPackageService,
    pub create: Arc<CreatePackageService>,
    pub deprecate: Arc<DeprecatePackageService>,
    pub cache: Arc<MetadataCacheService>,
    pub project_id: Uuid,
    pub user_id: Uuid,
    _dir: TempDir,
}

pub async fn harness() -> Harness {
    harness_with(
        Arc::new(AllowAll),
        Arc::new(ProtectedPatterns::default()),
        RegistryConfig::default(),
    )
    .await
}

pub async fn harness_with_config(config: RegistryConfig) -> Harness {
    harness_with(
        Arc::new(AllowAll),
        Arc::new(ProtectedPatterns::default()),
        config,
    )
    .await
}

pub async fn harness_with(
    authorizer: Arc<dyn Authorizer>,
    policy: Arc<dyn PackagePolicy>,
    config: RegistryConfig,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteStore::new(dir.path().join("metadata.db"))
            .await
            .unwrap(),
    );
    let objects = Arc::new(MemoryBackend::new());
    let leases = Arc::new(InMemoryLeaseProvider::new());
    let scheduler = Arc::new(RecordingScheduler::new());
    let tracker = Arc::new(RecordingTracker::new());
    let config = Arc::new(config);

    let worker = Arc::new(IngestWorker::new(
        store.clone(),
        objects.clone(),
        leases.clone(),
        authorizer.clone(),
        scheduler.clone(),
        tracker.clone(),
        config.clone(),
    ));
    let orchestrator = TemporaryPackageService::new(
        store.clone(),
        objects.clone(),
        authorizer,
        policy,
        scheduler.clone(),
    );
    let create = Arc::new(CreatePackageService::new(
        store.clone(),
        objects.clone(),
        leases.clone(),
        tracker.clone(),
        config.clone(),
    ));
    let deprecate = Arc::new(DeprecatePackageService::new(
        store.clone(),
        scheduler.clone(),
        tracker.clone(),
        config.clone(),
    ));
    let cache = Arc::new(MetadataCacheService::new(
        store.clone(),
        objects.clone(),
        leases.clone(),
        config.clone(),
    ));

    Harness {
        store,
        objects,
        leases,
        scheduler,
        tracker,
        config,
        worker,
        orchestrator,
        create,
        deprecate,
        cache,
        project_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        _dir: dir,
    }
}

/// Build a gzip tar archive from `(path, contents)` entries.
pub fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// The manifest used by default publish fixtures.
pub fn default_manifest(name: &str, version: &str) -> serde_json::Value {
    json!({
        "name": name,
        "version": version,
        "scripts": {"build": "tsc"},
        "dependencies": {"left-pad": "^1.0.0"},
        "license": "MIT",
        "readme": "# big readme",
        "readmeFilename": "README.md",
        "licenseText": "The MIT License"
    })
}

/// A publish body whose tarball embeds `tarball_manifest` while the
/// `versions` map carries `version_manifest`. Coherent fixtures pass the
/// same document for both.
pub fn publish_body_with(
    name: &str,
    version: &str,
    version_manifest: &serde_json::Value,
    tarball_manifest: &serde_json::Value,
) -> Vec<u8> {
    let archive = tarball(&[(
        "package/package.json",
        tarball_manifest.to_string().as_bytes(),
    )]);
    json!({
        "_id": name,
        "name": name,
        "versions": {version: version_manifest},
        "dist-tags": {"latest": version},
        "_attachments": {
            format!("{name}-{version}.tgz"): {
                "data": general_purpose::STANDARD.encode(&archive),
                "content_type": "application/octet-stream"
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// A coherent publish body for `name@version`.
pub fn publish_body(name: &str, version: &str) -> Vec<u8> {
    let manifest = default_manifest(name, version);
    publish_body_with(name, version, &manifest, &manifest)
}

/// A deprecation body: `(version, deprecation message)` pairs, where `None`
/// omits the `deprecated` key entirely.
pub fn deprecate_body(name: &str, versions: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut map = serde_json::Map::new();
    for (version, message) in versions {
        let mut fragment = json!({"name": name, "version": version});
        if let Some(message) = message {
            fragment["deprecated"] = json!(message);
        }
        map.insert((*version).to_string(), fragment);
    }
    json!({"_id": name, "name": name, "versions": map})
        .to_string()
        .into_bytes()
}

/// Parse a fixture body back into a request.
pub fn parse_request(body: &[u8]) -> PublishRequest {
    PublishRequest::parse(body).unwrap()
}
