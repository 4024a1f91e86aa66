//! Metadata store trait and SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{
    DependencyRow, MetadataCacheRow, NpmMetadatumRow, PackageBundle, PackageFileRow, PackageRow,
    StatusGroup, TagRow,
};
use crate::repos::{
    CacheRepo, DependencyRepo, LeaseRepo, MetadatumRepo, PackageFileRepo, PackageRepo, TagRepo,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    PackageRepo
    + PackageFileRepo
    + TagRepo
    + DependencyRepo
    + MetadatumRepo
    + CacheRepo
    + LeaseRepo
    + Send
    + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Embedded schema, applied idempotently on startup.
///
/// The partial unique index scopes the `(project, type, name, version)`
/// invariant to live rows: pending_destruction packages are invisible to the
/// constraint so an identity can be republished after a soft delete. This
/// index is the correctness backstop behind the create lease.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    package_id BLOB PRIMARY KEY,
    project_id BLOB NOT NULL,
    package_type TEXT NOT NULL,
    name TEXT NOT NULL,
    version TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS uniq_current_package
    ON packages (project_id, package_type, name, version)
    WHERE status != 'pending_destruction';

CREATE INDEX IF NOT EXISTS idx_packages_by_name
    ON packages (project_id, package_type, name);

CREATE TABLE IF NOT EXISTS package_files (
    file_id BLOB PRIMARY KEY,
    package_id BLOB NOT NULL REFERENCES packages(package_id),
    file_name TEXT NOT NULL,
    object_key TEXT NOT NULL,
    size INTEGER NOT NULL,
    file_sha1 TEXT NOT NULL,
    file_sha256 TEXT NOT NULL,
    content_type TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_package_files_package
    ON package_files (package_id);

CREATE TABLE IF NOT EXISTS npm_metadata (
    package_id BLOB PRIMARY KEY REFERENCES packages(package_id),
    package_json TEXT NOT NULL,
    package_json_scripts TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS package_tags (
    tag_id BLOB PRIMARY KEY,
    project_id BLOB NOT NULL,
    package_name TEXT NOT NULL,
    package_type TEXT NOT NULL,
    tag_name TEXT NOT NULL,
    package_id BLOB NOT NULL REFERENCES packages(package_id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project_id, package_type, package_name, tag_name)
);

CREATE TABLE IF NOT EXISTS package_dependencies (
    package_id BLOB NOT NULL REFERENCES packages(package_id),
    dependency_type TEXT NOT NULL,
    name TEXT NOT NULL,
    version_pattern TEXT NOT NULL,
    PRIMARY KEY (package_id, dependency_type, name)
);

CREATE TABLE IF NOT EXISTS metadata_caches (
    cache_id BLOB PRIMARY KEY,
    project_id BLOB NOT NULL,
    package_name TEXT NOT NULL,
    object_key TEXT NOT NULL,
    size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project_id, package_name)
);

CREATE TABLE IF NOT EXISTS leases (
    lease_key TEXT PRIMARY KEY,
    taken_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store, applying the schema.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under worker
            // concurrency.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// Implement all the repository traits for SqliteStore
mod sqlite_impl {
    use super::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    async fn insert_package(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        package: &PackageRow,
    ) -> MetadataResult<()> {
        let result = sqlx::query(
            "INSERT INTO packages (package_id, project_id, package_type, name, version, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(package.package_id)
        .bind(package.project_id)
        .bind(&package.package_type)
        .bind(&package.name)
        .bind(&package.version)
        .bind(&package.status)
        .bind(package.created_at)
        .bind(package.updated_at)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                "package {}@{} already exists",
                package.name, package.version
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_file(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        file: &PackageFileRow,
    ) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO package_files (file_id, package_id, file_name, object_key, size, file_sha1, file_sha256, content_type, status, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(file.file_id)
        .bind(file.package_id)
        .bind(&file.file_name)
        .bind(&file.object_key)
        .bind(file.size)
        .bind(&file.file_sha1)
        .bind(&file.file_sha256)
        .bind(&file.content_type)
        .bind(&file.status)
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn upsert_metadatum_in_tx(
        tx: &mut sqlx::Transaction<'_, Sqlite>,
        metadatum: &NpmMetadatumRow,
    ) -> MetadataResult<()> {
        sqlx::query(
            "INSERT INTO npm_metadata (package_id, package_json, package_json_scripts, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(package_id) DO UPDATE SET \
               package_json = excluded.package_json, \
               package_json_scripts = excluded.package_json_scripts, \
               updated_at = excluded.updated_at",
        )
        .bind(metadatum.package_id)
        .bind(&metadatum.package_json)
        .bind(&metadatum.package_json_scripts)
        .bind(metadatum.created_at)
        .bind(metadatum.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    #[async_trait]
    impl PackageRepo for SqliteStore {
        async fn create_package_with_assets(&self, bundle: &PackageBundle) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            let now = OffsetDateTime::now_utc();

            insert_package(&mut tx, &bundle.package).await?;
            insert_file(&mut tx, &bundle.file).await?;

            // Dependencies are fully replaced per create.
            sqlx::query("DELETE FROM package_dependencies WHERE package_id = ?")
                .bind(bundle.package.package_id)
                .execute(&mut *tx)
                .await?;
            for dependency in &bundle.dependencies {
                sqlx::query(
                    "INSERT INTO package_dependencies (package_id, dependency_type, name, version_pattern) \
                     VALUES (?, ?, ?, ?)",
                )
                .bind(dependency.package_id)
                .bind(&dependency.dependency_type)
                .bind(&dependency.name)
                .bind(&dependency.version_pattern)
                .execute(&mut *tx)
                .await?;
            }

            if let Some(tag_name) = &bundle.dist_tag {
                // Re-pointing updates the existing row; the fresh tag_id is
                // discarded on conflict.
                sqlx::query(
                    "INSERT INTO package_tags (tag_id, project_id, package_name, package_type, tag_name, package_id, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT(project_id, package_type, package_name, tag_name) DO UPDATE SET \
                       package_id = excluded.package_id, \
                       updated_at = excluded.updated_at",
                )
                .bind(Uuid::new_v4())
                .bind(bundle.package.project_id)
                .bind(&bundle.package.name)
                .bind(&bundle.package.package_type)
                .bind(tag_name)
                .bind(bundle.package.package_id)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }

            if let Some(metadatum) = &bundle.metadatum {
                upsert_metadatum_in_tx(&mut tx, metadatum).await?;
            }

            tx.commit().await?;
            Ok(())
        }

        async fn create_package_with_file(
            &self,
            package: &PackageRow,
            file: &PackageFileRow,
        ) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            insert_package(&mut tx, package).await?;
            insert_file(&mut tx, file).await?;
            tx.commit().await?;
            Ok(())
        }

        async fn get_package(&self, package_id: Uuid) -> MetadataResult<Option<PackageRow>> {
            let row =
                sqlx::query_as::<_, PackageRow>("SELECT * FROM packages WHERE package_id = ?")
                    .bind(package_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn find_current_package(
            &self,
            project_id: Uuid,
            name: &str,
            version: &str,
        ) -> MetadataResult<Option<PackageRow>> {
            let row = sqlx::query_as::<_, PackageRow>(
                "SELECT * FROM packages \
                 WHERE project_id = ? AND name = ? AND version = ? \
                   AND status != 'pending_destruction'",
            )
            .bind(project_id)
            .bind(name)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_current_by_name(
            &self,
            project_id: Uuid,
            name: &str,
        ) -> MetadataResult<Vec<PackageRow>> {
            let rows = sqlx::query_as::<_, PackageRow>(
                "SELECT * FROM packages \
                 WHERE project_id = ? AND name = ? \
                   AND status != 'pending_destruction' \
                 ORDER BY version",
            )
            .bind(project_id)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_ids_by_name_and_versions(
            &self,
            project_id: Uuid,
            name: &str,
            versions: &[String],
        ) -> MetadataResult<Vec<Uuid>> {
            if versions.is_empty() {
                return Ok(Vec::new());
            }

            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT package_id FROM packages \
                 WHERE status != 'pending_destruction' AND project_id = ",
            );
            qb.push_bind(project_id);
            qb.push(" AND name = ").push_bind(name);
            qb.push(" AND version IN (");
            let mut separated = qb.separated(", ");
            for version in versions {
                separated.push_bind(version);
            }
            qb.push(") ORDER BY version");

            let ids: Vec<Uuid> = qb.build_query_scalar().fetch_all(&self.pool).await?;
            Ok(ids)
        }

        async fn get_packages_with_metadata(
            &self,
            package_ids: &[Uuid],
        ) -> MetadataResult<Vec<(PackageRow, Option<NpmMetadatumRow>)>> {
            if package_ids.is_empty() {
                return Ok(Vec::new());
            }

            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT * FROM packages WHERE package_id IN (");
            let mut separated = qb.separated(", ");
            for id in package_ids {
                separated.push_bind(*id);
            }
            qb.push(") ORDER BY version");
            let packages: Vec<PackageRow> =
                qb.build_query_as().fetch_all(&self.pool).await?;

            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT * FROM npm_metadata WHERE package_id IN (");
            let mut separated = qb.separated(", ");
            for id in package_ids {
                separated.push_bind(*id);
            }
            qb.push(")");
            let metadata: Vec<NpmMetadatumRow> =
                qb.build_query_as().fetch_all(&self.pool).await?;

            let mut by_package: std::collections::HashMap<Uuid, NpmMetadatumRow> =
                metadata.into_iter().map(|m| (m.package_id, m)).collect();

            Ok(packages
                .into_iter()
                .map(|p| {
                    let metadatum = by_package.remove(&p.package_id);
                    (p, metadatum)
                })
                .collect())
        }

        async fn update_package_status(
            &self,
            package_id: Uuid,
            status: &str,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE packages SET status = ?, updated_at = ? WHERE package_id = ?",
            )
            .bind(status)
            .bind(OffsetDateTime::now_utc())
            .bind(package_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "package {package_id} not found"
                )));
            }
            Ok(())
        }

        async fn finalize_package(&self, package_id: Uuid, file_id: Uuid) -> MetadataResult<()> {
            self.transition_package(package_id, file_id, "default").await
        }

        async fn fail_package(&self, package_id: Uuid, file_id: Uuid) -> MetadataResult<()> {
            self.transition_package(package_id, file_id, "error").await
        }
    }

    impl SqliteStore {
        /// Move a package and its file to the same status atomically.
        async fn transition_package(
            &self,
            package_id: Uuid,
            file_id: Uuid,
            status: &str,
        ) -> MetadataResult<()> {
            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            let result = sqlx::query(
                "UPDATE packages SET status = ?, updated_at = ? WHERE package_id = ?",
            )
            .bind(status)
            .bind(now)
            .bind(package_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "package {package_id} not found"
                )));
            }

            sqlx::query("UPDATE package_files SET status = ?, updated_at = ? WHERE file_id = ?")
                .bind(status)
                .bind(now)
                .bind(file_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl PackageFileRepo for SqliteStore {
        async fn get_file(&self, file_id: Uuid) -> MetadataResult<Option<PackageFileRow>> {
            let row =
                sqlx::query_as::<_, PackageFileRow>("SELECT * FROM package_files WHERE file_id = ?")
                    .bind(file_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn update_file_status(&self, file_id: Uuid, status: &str) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE package_files SET status = ?, updated_at = ? WHERE file_id = ?",
            )
            .bind(status)
            .bind(OffsetDateTime::now_utc())
            .bind(file_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("file {file_id} not found")));
            }
            Ok(())
        }

        async fn list_files_for_packages(
            &self,
            package_ids: &[Uuid],
        ) -> MetadataResult<Vec<PackageFileRow>> {
            if package_ids.is_empty() {
                return Ok(Vec::new());
            }

            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT * FROM package_files WHERE package_id IN (");
            let mut separated = qb.separated(", ");
            for id in package_ids {
                separated.push_bind(*id);
            }
            qb.push(") ORDER BY created_at");
            let rows: Vec<PackageFileRow> = qb.build_query_as().fetch_all(&self.pool).await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl TagRepo for SqliteStore {
        async fn upsert_tag(&self, tag: &TagRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO package_tags (tag_id, project_id, package_name, package_type, tag_name, package_id, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(project_id, package_type, package_name, tag_name) DO UPDATE SET \
                   package_id = excluded.package_id, \
                   updated_at = excluded.updated_at",
            )
            .bind(tag.tag_id)
            .bind(tag.project_id)
            .bind(&tag.package_name)
            .bind(&tag.package_type)
            .bind(&tag.tag_name)
            .bind(tag.package_id)
            .bind(tag.created_at)
            .bind(tag.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn list_tags(
            &self,
            project_id: Uuid,
            package_name: &str,
            package_type: &str,
        ) -> MetadataResult<Vec<TagRow>> {
            let rows = sqlx::query_as::<_, TagRow>(
                "SELECT * FROM package_tags \
                 WHERE project_id = ? AND package_name = ? AND package_type = ? \
                 ORDER BY tag_name",
            )
            .bind(project_id)
            .bind(package_name)
            .bind(package_type)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl DependencyRepo for SqliteStore {
        async fn list_dependencies(
            &self,
            package_id: Uuid,
        ) -> MetadataResult<Vec<DependencyRow>> {
            let rows = sqlx::query_as::<_, DependencyRow>(
                "SELECT * FROM package_dependencies WHERE package_id = ? \
                 ORDER BY dependency_type, name",
            )
            .bind(package_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl MetadatumRepo for SqliteStore {
        async fn get_metadatum(
            &self,
            package_id: Uuid,
        ) -> MetadataResult<Option<NpmMetadatumRow>> {
            let row = sqlx::query_as::<_, NpmMetadatumRow>(
                "SELECT * FROM npm_metadata WHERE package_id = ?",
            )
            .bind(package_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn upsert_metadatum(&self, metadatum: &NpmMetadatumRow) -> MetadataResult<()> {
            let mut tx = self.pool.begin().await?;
            upsert_metadatum_in_tx(&mut tx, metadatum).await?;
            tx.commit().await?;
            Ok(())
        }

        async fn apply_deprecation_batch(
            &self,
            metadata: &[NpmMetadatumRow],
            status_groups: &[StatusGroup],
        ) -> MetadataResult<()> {
            if metadata.is_empty() && status_groups.is_empty() {
                return Ok(());
            }

            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;

            if !metadata.is_empty() {
                // One bulk upsert for the whole batch. Existing rows keep
                // their recorded scripts; deprecation only rewrites the
                // manifest document.
                let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                    "INSERT INTO npm_metadata (package_id, package_json, package_json_scripts, created_at, updated_at) ",
                );
                qb.push_values(metadata, |mut b, m| {
                    b.push_bind(m.package_id)
                        .push_bind(&m.package_json)
                        .push_bind(&m.package_json_scripts)
                        .push_bind(m.created_at)
                        .push_bind(m.updated_at);
                });
                qb.push(
                    " ON CONFLICT(package_id) DO UPDATE SET \
                       package_json = excluded.package_json, \
                       updated_at = excluded.updated_at",
                );
                qb.build().execute(&mut *tx).await?;
            }

            // Separate bulk update per distinct target status.
            for group in status_groups {
                if group.package_ids.is_empty() {
                    continue;
                }
                let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE packages SET status = ");
                qb.push_bind(&group.status);
                qb.push(", updated_at = ").push_bind(now);
                qb.push(" WHERE package_id IN (");
                let mut separated = qb.separated(", ");
                for id in &group.package_ids {
                    separated.push_bind(*id);
                }
                qb.push(")");
                qb.build().execute(&mut *tx).await?;
            }

            tx.commit().await?;
            Ok(())
        }
    }

    #[async_trait]
    impl CacheRepo for SqliteStore {
        async fn get_cache(
            &self,
            project_id: Uuid,
            package_name: &str,
        ) -> MetadataResult<Option<MetadataCacheRow>> {
            let row = sqlx::query_as::<_, MetadataCacheRow>(
                "SELECT * FROM metadata_caches WHERE project_id = ? AND package_name = ?",
            )
            .bind(project_id)
            .bind(package_name)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn upsert_cache(&self, cache: &MetadataCacheRow) -> MetadataResult<()> {
            sqlx::query(
                "INSERT INTO metadata_caches (cache_id, project_id, package_name, object_key, size, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?) \
                 ON CONFLICT(project_id, package_name) DO UPDATE SET \
                   object_key = excluded.object_key, \
                   size = excluded.size, \
                   updated_at = excluded.updated_at",
            )
            .bind(cache.cache_id)
            .bind(cache.project_id)
            .bind(&cache.package_name)
            .bind(&cache.object_key)
            .bind(cache.size)
            .bind(cache.created_at)
            .bind(cache.updated_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        }
    }

    #[async_trait]
    impl LeaseRepo for SqliteStore {
        async fn try_acquire_lease(&self, key: &str, ttl: Duration) -> MetadataResult<bool> {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            let expires_at = now + ttl.as_secs() as i64;

            let mut tx = self.pool.begin().await?;

            // Expired leases self-heal on the next acquisition attempt.
            sqlx::query("DELETE FROM leases WHERE expires_at <= ?")
                .bind(now)
                .execute(&mut *tx)
                .await?;

            let result = sqlx::query(
                "INSERT INTO leases (lease_key, taken_at, expires_at) VALUES (?, ?, ?) \
                 ON CONFLICT(lease_key) DO NOTHING",
            )
            .bind(key)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;

            let acquired = result.rows_affected() > 0;
            if !acquired {
                tracing::debug!(key = %key, "lease already held");
            }
            Ok(acquired)
        }

        async fn release_lease(&self, key: &str) -> MetadataResult<()> {
            sqlx::query("DELETE FROM leases WHERE lease_key = ?")
                .bind(key)
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }
}
