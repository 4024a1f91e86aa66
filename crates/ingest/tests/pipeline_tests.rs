//! End-to-end ingestion pipeline tests.

mod common;

use amphora_core::{PackageStatus, PublishRequest};
use amphora_ingest::{ErrorReason, Job, LeaseProvider, ProcessOutcome, ProtectedPatterns};
use amphora_metadata::repos::{CacheRepo, MetadatumRepo, PackageFileRepo, PackageRepo, TagRepo};
use bytes::Bytes;
use common::{
    default_manifest, deprecate_body, harness, harness_with, publish_body, publish_body_with,
};
use std::sync::Arc;

#[tokio::test]
async fn test_publish_end_to_end() {
    let h = harness().await;

    let temporary = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();

    // The orchestrator handed off exactly one processing job.
    let jobs = h.scheduler.take_jobs();
    assert_eq!(
        jobs,
        vec![Job::ProcessPackageFile {
            file_id: temporary.file_id,
            user_id: h.user_id,
            deprecate: false,
        }]
    );

    let outcome = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, false)
        .await
        .unwrap();
    let package_id = match outcome {
        ProcessOutcome::Published { package_id } => package_id,
        other => panic!("expected publish, got {other:?}"),
    };

    // Exactly one finalized package under the real identity.
    let package = h
        .store
        .find_current_package(h.project_id, "foo", "1.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.package_id, package_id);
    assert_eq!(package.status, PackageStatus::Default.as_str());

    // One tag pointing at it.
    let tags = h.store.list_tags(h.project_id, "foo", "npm").await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].tag_name, "latest");
    assert_eq!(tags[0].package_id, package_id);

    // The metadatum excludes the documentation fields but keeps the rest.
    let metadatum = h.store.get_metadatum(package_id).await.unwrap().unwrap();
    for field in ["readme", "readmeFilename", "licenseText"] {
        assert!(
            !metadatum.package_json.contains(field),
            "{field} leaked into metadata"
        );
    }
    assert!(metadatum.package_json.contains("left-pad"));
    assert!(metadatum.package_json_scripts.contains("build"));

    // The placeholder was cleaned up and a cache refresh enqueued.
    let placeholder = h
        .store
        .get_package(temporary.package_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placeholder.status, PackageStatus::PendingDestruction.as_str());

    let jobs = h.scheduler.take_jobs();
    assert_eq!(
        jobs,
        vec![Job::RebuildMetadataCache {
            project_id: h.project_id,
            package_name: "foo".to_string(),
        }]
    );
    h.worker.handle(jobs[0].clone()).await.unwrap();
    assert!(h.store.get_cache(h.project_id, "foo").await.unwrap().is_some());
}

#[tokio::test]
async fn test_republish_same_version_rejected() {
    let h = harness().await;

    let first = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();
    h.worker
        .process_package_file(first.file_id, h.user_id, false)
        .await
        .unwrap();

    let second = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();
    let err = h
        .worker
        .process_package_file(second.file_id, h.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::PackageAlreadyExists);

    // Still exactly one package under the identity; the second placeholder
    // records the failure.
    let survivors: Vec<_> = h
        .store
        .list_current_by_name(h.project_id, "foo")
        .await
        .unwrap()
        .into_iter()
        .filter(|p| p.version == "1.0.0")
        .collect();
    assert_eq!(survivors.len(), 1);

    let placeholder = h
        .store
        .get_package(second.package_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placeholder.status, PackageStatus::Error.as_str());
    let file = h.store.get_file(second.file_id).await.unwrap().unwrap();
    assert_eq!(file.status, "error");
}

#[tokio::test]
async fn test_redelivered_job_is_a_noop() {
    let h = harness().await;
    let temporary = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();

    h.worker
        .process_package_file(temporary.file_id, h.user_id, false)
        .await
        .unwrap();
    // At-least-once delivery: the second attempt observes the settled file.
    let outcome = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, false)
        .await
        .unwrap();
    assert_eq!(outcome, ProcessOutcome::AlreadyProcessed);
}

#[tokio::test]
async fn test_mismatched_manifest_marks_error() {
    let h = harness().await;

    // The tarball's embedded manifest disagrees about the version.
    let version_manifest = default_manifest("foo", "1.0.0");
    let tarball_manifest = default_manifest("foo", "9.9.9");
    let body = publish_body_with("foo", "1.0.0", &version_manifest, &tarball_manifest);

    let temporary = h
        .orchestrator
        .execute(h.user_id, h.project_id, "foo", Bytes::from(body), false)
        .await
        .unwrap();
    let err = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::Mismatch);

    // The real package was created but never finalized.
    let package = h
        .store
        .find_current_package(h.project_id, "foo", "1.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.status, PackageStatus::Error.as_str());
    // The mismatch was reported to the error tracker.
    assert!(!h.tracker.events().is_empty());
}

#[tokio::test]
async fn test_scripts_mismatch_is_rejected() {
    let h = harness().await;

    let mut tarball_manifest = default_manifest("foo", "1.0.0");
    tarball_manifest["scripts"] = serde_json::json!({});
    let body = publish_body_with(
        "foo",
        "1.0.0",
        &default_manifest("foo", "1.0.0"),
        &tarball_manifest,
    );

    let temporary = h
        .orchestrator
        .execute(h.user_id, h.project_id, "foo", Bytes::from(body), false)
        .await
        .unwrap();
    let err = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::Mismatch);
    assert!(err.message.contains("scripts"));
}

#[tokio::test]
async fn test_deprecate_end_to_end() {
    let h = harness().await;

    let published = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();
    h.worker
        .process_package_file(published.file_id, h.user_id, false)
        .await
        .unwrap();
    h.scheduler.take_jobs();

    let temporary = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(deprecate_body("foo", &[("1.0.0", Some("deprecated msg"))])),
            true,
        )
        .await
        .unwrap();
    h.scheduler.take_jobs();

    let outcome = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, true)
        .await
        .unwrap();
    assert_eq!(outcome, ProcessOutcome::Deprecated { updated: 1 });

    let package = h
        .store
        .find_current_package(h.project_id, "foo", "1.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.status, PackageStatus::Deprecated.as_str());

    let metadatum = h
        .store
        .get_metadatum(package.package_id)
        .await
        .unwrap()
        .unwrap();
    let document: serde_json::Value = serde_json::from_str(&metadatum.package_json).unwrap();
    assert_eq!(document["deprecated"], "deprecated msg");

    // Exactly one cache refresh for the whole run.
    let refreshes: Vec<_> = h
        .scheduler
        .take_jobs()
        .into_iter()
        .filter(|job| matches!(job, Job::RebuildMetadataCache { .. }))
        .collect();
    assert_eq!(refreshes.len(), 1);

    // The actor may destroy packages, so the placeholder was marked for
    // destruction once deprecation completed.
    let placeholder = h
        .store
        .get_package(temporary.package_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placeholder.status, PackageStatus::PendingDestruction.as_str());
}

#[tokio::test]
async fn test_deprecation_is_idempotent() {
    let h = harness().await;

    let published = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();
    h.worker
        .process_package_file(published.file_id, h.user_id, false)
        .await
        .unwrap();
    h.scheduler.take_jobs();

    let request = PublishRequest::parse(&deprecate_body(
        "foo",
        &[("1.0.0", Some("deprecated msg"))],
    ))
    .unwrap();

    let first = h.deprecate.execute(h.project_id, &request).await.unwrap();
    assert_eq!(first.updated, 1);
    assert!(first.cache_refresh_enqueued);

    // Second run with the same payload: complete no-op.
    let second = h.deprecate.execute(h.project_id, &request).await.unwrap();
    assert_eq!(second.updated, 0);
    assert!(!second.cache_refresh_enqueued);

    let refreshes = h.scheduler.take_jobs();
    assert_eq!(refreshes.len(), 1, "no job enqueued for the no-op run");
}

#[tokio::test]
async fn test_empty_message_undeprecates() {
    let h = harness().await;

    let published = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap();
    h.worker
        .process_package_file(published.file_id, h.user_id, false)
        .await
        .unwrap();

    let deprecate = PublishRequest::parse(&deprecate_body("foo", &[("1.0.0", Some("old"))]))
        .unwrap();
    h.deprecate.execute(h.project_id, &deprecate).await.unwrap();

    let undeprecate =
        PublishRequest::parse(&deprecate_body("foo", &[("1.0.0", Some(""))])).unwrap();
    let outcome = h
        .deprecate
        .execute(h.project_id, &undeprecate)
        .await
        .unwrap();
    assert_eq!(outcome.updated, 1);

    let package = h
        .store
        .find_current_package(h.project_id, "foo", "1.0.0")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(package.status, PackageStatus::Default.as_str());
    let metadatum = h
        .store
        .get_metadatum(package.package_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!metadatum.package_json.contains("deprecated"));

    // Un-deprecating a never-deprecated package is a no-op (nil and empty
    // are the same "not deprecated" state).
    let noop = h
        .deprecate
        .execute(h.project_id, &undeprecate)
        .await
        .unwrap();
    assert_eq!(noop.updated, 0);
}

#[tokio::test]
async fn test_concurrent_creates_persist_exactly_one_package() {
    let h = harness().await;
    let request = Arc::new(PublishRequest::parse(&publish_body("foo", "1.0.0")).unwrap());

    let mut handles = Vec::new();
    for _ in 0..2 {
        let create = h.create.clone();
        let request = request.clone();
        let project_id = h.project_id;
        handles.push(tokio::spawn(async move {
            create
                .execute(project_id, &request, PackageStatus::Default)
                .await
        }));
    }

    let mut ok = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(err) => {
                assert!(
                    matches!(
                        err.reason,
                        ErrorReason::PackageAlreadyExists | ErrorReason::CouldNotObtainLease
                    ),
                    "unexpected reason: {err}"
                );
                rejected += 1;
            }
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(rejected, 1);

    let packages = h.store.list_current_by_name(h.project_id, "foo").await.unwrap();
    assert_eq!(packages.len(), 1);
}

#[tokio::test]
async fn test_version_empty_rejected() {
    let h = harness().await;

    let no_versions = PublishRequest::parse(br#"{"name":"foo"}"#).unwrap();
    let err = h
        .create
        .execute(h.project_id, &no_versions, PackageStatus::Default)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::VersionEmpty);

    let blank = PublishRequest::parse(
        br#"{"name":"foo","versions":{"  ":{"name":"foo","version":"  "}}}"#,
    )
    .unwrap();
    let err = h
        .create
        .execute(h.project_id, &blank, PackageStatus::Default)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::VersionEmpty);
}

#[tokio::test]
async fn test_file_too_large_rejected() {
    let mut config = amphora_core::RegistryConfig::default();
    config.max_file_size = 8;
    let h = common::harness_with_config(config).await;

    let request = PublishRequest::parse(&publish_body("foo", "1.0.0")).unwrap();
    let err = h
        .create
        .execute(h.project_id, &request, PackageStatus::Default)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::FileTooLarge);
}

#[tokio::test]
async fn test_held_lease_fails_fast() {
    let h = harness().await;
    let request = PublishRequest::parse(&publish_body("foo", "1.0.0")).unwrap();

    let key = amphora_ingest::lease::create_package_lease_key(&h.project_id, "foo", "1.0.0");
    assert!(
        h.leases
            .try_obtain(&key, std::time::Duration::from_secs(60))
            .await
            .unwrap()
    );

    let err = h
        .create
        .execute(h.project_id, &request, PackageStatus::Default)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::CouldNotObtainLease);
}

#[tokio::test]
async fn test_deprecation_guards() {
    let h = harness().await;

    // No versions at all.
    let temporary = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(r#"{"name":"foo"}"#.as_bytes().to_vec()),
            true,
        )
        .await
        .unwrap();
    let err = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::MissingVersions);

    // Versions present, but none carries a deprecated field.
    let temporary = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(deprecate_body("foo", &[("1.0.0", None)])),
            true,
        )
        .await
        .unwrap();
    let err = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, true)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::MissingDeprecatedVersions);

    let placeholder = h
        .store
        .get_package(temporary.package_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placeholder.status, PackageStatus::Error.as_str());
}

#[tokio::test]
async fn test_malformed_payload_is_a_parser_error() {
    let h = harness().await;
    let temporary = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from_static(b"{not json"),
            false,
        )
        .await
        .unwrap();
    let err = h
        .worker
        .process_package_file(temporary.file_id, h.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::JsonParserError);

    let file = h.store.get_file(temporary.file_id).await.unwrap().unwrap();
    assert_eq!(file.status, "error");
}

#[tokio::test]
async fn test_orchestrator_fails_closed() {
    // Unauthorized actor: nothing is written, nothing is enqueued.
    let h = harness_with(
        Arc::new(amphora_ingest::DenyAll),
        Arc::new(ProtectedPatterns::default()),
        amphora_core::RegistryConfig::default(),
    )
    .await;
    let err = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "foo",
            Bytes::from(publish_body("foo", "1.0.0")),
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::Unauthorized);
    assert!(h.scheduler.jobs().is_empty());
    assert!(h.objects.is_empty().await);

    // Protected name.
    let h = harness_with(
        Arc::new(amphora_ingest::AllowAll),
        Arc::new(ProtectedPatterns::new(vec!["@corp/*".to_string()])),
        amphora_core::RegistryConfig::default(),
    )
    .await;
    let err = h
        .orchestrator
        .execute(
            h.user_id,
            h.project_id,
            "@corp/secret",
            Bytes::from(publish_body("@corp/secret", "1.0.0")),
            false,
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason, ErrorReason::PackageProtected);
}
