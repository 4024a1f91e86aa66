//! Registry configuration shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the ingestion pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Public base URL used to build `dist.tarball` links in the metadata
    /// cache (e.g., "https://registry.example.com/packages/npm").
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Maximum decoded tarball size accepted for a package file.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum size of the `package.json` entry extracted from a tarball.
    #[serde(default = "default_max_manifest_entry_size")]
    pub max_manifest_entry_size: u64,

    /// Maximum serialized size of a stored metadatum `package_json`.
    #[serde(default = "default_max_metadata_json_size")]
    pub max_metadata_json_size: usize,

    /// Number of fields reported by metadatum oversize diagnostics.
    #[serde(default = "default_diagnostic_field_count")]
    pub diagnostic_field_count: usize,

    /// Minimum serialized field size considered for oversize diagnostics.
    #[serde(default = "default_diagnostic_min_field_size")]
    pub diagnostic_min_field_size: usize,

    /// Packages processed per deprecation batch. Bounds transaction and lock
    /// scope; also the cooperative-cancellation granularity.
    #[serde(default = "default_deprecation_batch_size")]
    pub deprecation_batch_size: usize,

    /// Lease timeout in seconds for create and cache-rebuild serialization.
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,
}

impl RegistryConfig {
    /// Lease timeout as a [`Duration`].
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/packages/npm".to_string()
}

fn default_max_file_size() -> u64 {
    crate::MAX_PACKAGE_FILE_SIZE
}

fn default_max_manifest_entry_size() -> u64 {
    crate::MAX_MANIFEST_ENTRY_SIZE
}

fn default_max_metadata_json_size() -> usize {
    crate::MAX_METADATA_JSON_SIZE
}

fn default_diagnostic_field_count() -> usize {
    5
}

fn default_diagnostic_min_field_size() -> usize {
    1000
}

fn default_deprecation_batch_size() -> usize {
    50
}

fn default_lease_timeout_secs() -> u64 {
    3600 // 1 hour
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            max_file_size: default_max_file_size(),
            max_manifest_entry_size: default_max_manifest_entry_size(),
            max_metadata_json_size: default_max_metadata_json_size(),
            diagnostic_field_count: default_diagnostic_field_count(),
            diagnostic_min_field_size: default_diagnostic_min_field_size(),
            deprecation_batch_size: default_deprecation_batch_size(),
            lease_timeout_secs: default_lease_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config: RegistryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_manifest_entry_size, 4 * 1024 * 1024);
        assert_eq!(config.deprecation_batch_size, 50);
        assert_eq!(config.lease_timeout(), Duration::from_secs(3600));
    }
}
