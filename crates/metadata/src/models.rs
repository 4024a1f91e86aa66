//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Packages
// =============================================================================

/// Package record. Identity is `(project_id, package_type, name, version)`;
/// uniqueness applies only to non-pending-destruction rows.
#[derive(Debug, Clone, FromRow)]
pub struct PackageRow {
    pub package_id: Uuid,
    pub project_id: Uuid,
    pub package_type: String,
    pub name: String,
    pub version: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Package file record. Owned by exactly one package; the bytes live in the
/// object store under `object_key`.
#[derive(Debug, Clone, FromRow)]
pub struct PackageFileRow {
    pub file_id: Uuid,
    pub package_id: Uuid,
    pub file_name: String,
    pub object_key: String,
    pub size: i64,
    pub file_sha1: String,
    pub file_sha256: String,
    pub content_type: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// npm metadata
// =============================================================================

/// The filtered `package.json` stored for one package, one-to-one.
///
/// `package_json_scripts` duplicates the manifest's `scripts` object; it
/// exists only for the coherence comparison against a re-uploaded tarball.
#[derive(Debug, Clone, FromRow)]
pub struct NpmMetadatumRow {
    pub package_id: Uuid,
    pub package_json: String,
    pub package_json_scripts: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Dist-tag record: one tag name pointing at exactly one package within a
/// `(project, package_name, package_type)` scope. Re-pointing updates the
/// existing row.
#[derive(Debug, Clone, FromRow)]
pub struct TagRow {
    pub tag_id: Uuid,
    pub project_id: Uuid,
    pub package_name: String,
    pub package_type: String,
    pub tag_name: String,
    pub package_id: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Declared dependency of a package, fully replaced on each create.
#[derive(Debug, Clone, FromRow)]
pub struct DependencyRow {
    pub package_id: Uuid,
    pub dependency_type: String,
    pub name: String,
    pub version_pattern: String,
}

// =============================================================================
// Metadata cache
// =============================================================================

/// Cached registry metadata document for one package name. Derived and
/// disposable; safe to delete and regenerate at any time.
#[derive(Debug, Clone, FromRow)]
pub struct MetadataCacheRow {
    pub cache_id: Uuid,
    pub project_id: Uuid,
    pub package_name: String,
    pub object_key: String,
    pub size: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Composite write payloads
// =============================================================================

/// Everything written atomically when a package is created.
#[derive(Debug, Clone)]
pub struct PackageBundle {
    pub package: PackageRow,
    pub file: PackageFileRow,
    pub dependencies: Vec<DependencyRow>,
    /// Dist-tag name to upsert pointing at the new package; `None` skips
    /// tagging.
    pub dist_tag: Option<String>,
    pub metadatum: Option<NpmMetadatumRow>,
}

/// One target status and the packages transitioning to it, applied as a
/// single bulk update inside a deprecation batch.
#[derive(Debug, Clone)]
pub struct StatusGroup {
    pub status: String,
    pub package_ids: Vec<Uuid>,
}
