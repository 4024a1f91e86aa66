//! npm package ingestion pipeline.
//!
//! Accepts an uploaded tarball plus manifest, validates coherence between
//! the two, persists package metadata, and regenerates the cached registry
//! document for the package name. The synchronous half (validation and
//! placeholder creation) and the asynchronous half (extraction, coherence
//! check, finalize, deprecation, cache rebuild) share no in-process state;
//! all handoff is durable identifiers carried by scheduler jobs, and all
//! cross-process mutual exclusion is named leases.
//!
//! Data flow: [`orchestrator::TemporaryPackageService`] creates a
//! placeholder, the [`worker::IngestWorker`] drives
//! [`archive::locate_manifest`] and [`coherence::check_manifest_coherence`],
//! [`create::CreatePackageService`] finalizes the package, and
//! [`cache::MetadataCacheService`] refreshes the published document. The
//! [`deprecate::DeprecatePackageService`] runs independently and also
//! triggers a cache refresh.

pub mod access;
pub mod archive;
pub mod cache;
pub mod coherence;
pub mod create;
pub mod deprecate;
pub mod error;
pub mod lease;
pub mod orchestrator;
pub mod scheduler;
pub mod telemetry;
pub mod worker;

pub use access::{AllowAll, Authorizer, DenyAll, PackagePolicy, ProtectedPatterns};
pub use archive::{ManifestEntry, locate_manifest};
pub use cache::{CacheOutcome, MetadataCacheService};
pub use coherence::check_manifest_coherence;
pub use create::{CreatePackageService, CreatedPackage};
pub use deprecate::{DeprecatePackageService, DeprecationOutcome};
pub use error::{
    ErrorReason, ExtractionError, MismatchError, ServiceError, ServiceResult,
};
pub use lease::{InMemoryLeaseProvider, LeaseProvider, StoreLeaseProvider};
pub use orchestrator::{TemporaryPackage, TemporaryPackageService};
pub use scheduler::{Job, JobScheduler, RecordingScheduler, TokioScheduler};
pub use telemetry::{ErrorTracker, RecordingTracker, TracingTracker};
pub use worker::{IngestWorker, ProcessOutcome};
