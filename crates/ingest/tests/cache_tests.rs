//! Metadata cache builder tests.

mod common;

use amphora_core::{PackageStatus, PublishRequest};
use amphora_ingest::lease::metadata_cache_lease_key;
use amphora_ingest::{CacheOutcome, LeaseProvider};
use amphora_metadata::repos::{CacheRepo, PackageRepo};
use amphora_storage::ObjectStore;
use common::{harness, publish_body};

async fn publish_version(h: &common::Harness, name: &str, version: &str) {
    let request = PublishRequest::parse(&publish_body(name, version)).unwrap();
    h.create
        .execute(h.project_id, &request, PackageStatus::Default)
        .await
        .unwrap();
}

async fn cache_bytes(h: &common::Harness, name: &str) -> Vec<u8> {
    let row = h
        .store
        .get_cache(h.project_id, name)
        .await
        .unwrap()
        .unwrap();
    h.objects.get(&row.object_key).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_rebuild_produces_registry_document() {
    let h = harness().await;
    publish_version(&h, "foo", "1.0.0").await;
    publish_version(&h, "foo", "2.0.0").await;

    let outcome = h.cache.execute(h.project_id, "foo").await.unwrap();
    let size = match outcome {
        CacheOutcome::Rebuilt { size } => size,
        other => panic!("expected rebuild, got {other:?}"),
    };

    let bytes = cache_bytes(&h, "foo").await;
    assert_eq!(bytes.len() as u64, size);

    let document: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["name"], "foo");
    // The tag followed the second publish.
    assert_eq!(document["dist-tags"]["latest"], "2.0.0");

    let versions = document["versions"].as_object().unwrap();
    assert_eq!(versions.len(), 2);
    let manifest = &versions["1.0.0"];
    assert_eq!(manifest["name"], "foo");
    assert_eq!(manifest["version"], "1.0.0");
    // Documentation fields never reach the cached document.
    assert!(manifest.get("readme").is_none());
    // Each version carries its dist pointer.
    let shasum = manifest["dist"]["shasum"].as_str().unwrap();
    assert_eq!(shasum.len(), 40);
    let tarball = manifest["dist"]["tarball"].as_str().unwrap();
    assert!(tarball.starts_with(&h.config.base_url));
    assert!(tarball.ends_with("foo-1.0.0.tgz"));
}

#[tokio::test]
async fn test_rebuild_is_idempotent_byte_for_byte() {
    let h = harness().await;
    publish_version(&h, "foo", "1.0.0").await;
    publish_version(&h, "foo", "2.0.0").await;

    h.cache.execute(h.project_id, "foo").await.unwrap();
    let first = cache_bytes(&h, "foo").await;

    h.cache.execute(h.project_id, "foo").await.unwrap();
    let second = cache_bytes(&h, "foo").await;

    assert_eq!(first, second);

    // The cache row was overwritten in place, not duplicated.
    let row = h
        .store
        .get_cache(h.project_id, "foo")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.size as usize, second.len());
}

#[tokio::test]
async fn test_busy_lease_is_a_noop() {
    let h = harness().await;
    publish_version(&h, "foo", "1.0.0").await;

    let key = metadata_cache_lease_key(&h.project_id, "foo");
    assert!(
        h.leases
            .try_obtain(&key, std::time::Duration::from_secs(60))
            .await
            .unwrap()
    );

    let outcome = h.cache.execute(h.project_id, "foo").await.unwrap();
    assert_eq!(outcome, CacheOutcome::LeaseBusy);
    assert!(h.store.get_cache(h.project_id, "foo").await.unwrap().is_none());

    // Releasing the lease lets the next rebuild proceed.
    h.leases.release(&key).await.unwrap();
    assert!(matches!(
        h.cache.execute(h.project_id, "foo").await.unwrap(),
        CacheOutcome::Rebuilt { .. }
    ));
}

#[tokio::test]
async fn test_pending_destruction_versions_are_excluded() {
    let h = harness().await;
    publish_version(&h, "foo", "1.0.0").await;
    publish_version(&h, "foo", "2.0.0").await;

    let gone = h
        .store
        .find_current_package(h.project_id, "foo", "2.0.0")
        .await
        .unwrap()
        .unwrap();
    h.store
        .update_package_status(gone.package_id, "pending_destruction")
        .await
        .unwrap();

    h.cache.execute(h.project_id, "foo").await.unwrap();
    let document: serde_json::Value =
        serde_json::from_slice(&cache_bytes(&h, "foo").await).unwrap();

    let versions = document["versions"].as_object().unwrap();
    assert_eq!(versions.len(), 1);
    assert!(versions.contains_key("1.0.0"));
    // The latest tag pointed at the destroyed version; it is dropped rather
    // than left dangling.
    assert!(document["dist-tags"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_name_still_builds_a_document() {
    let h = harness().await;
    let outcome = h.cache.execute(h.project_id, "ghost").await.unwrap();
    assert!(matches!(outcome, CacheOutcome::Rebuilt { .. }));

    let document: serde_json::Value =
        serde_json::from_slice(&cache_bytes(&h, "ghost").await).unwrap();
    assert_eq!(document["name"], "ghost");
    assert!(document["versions"].as_object().unwrap().is_empty());
}
