//! Parsed `package.json` manifests.
//!
//! The manifest is modeled as a closed struct with named fields for
//! everything the pipeline consumes, plus a flattened tail for the fields it
//! merely carries. Validation happens once at ingress; downstream code works
//! with this struct, never with raw JSON maps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Manifest fields excluded from stored metadata. These are large,
/// non-essential, and npm serves them from the top-level document instead.
pub const FILTERED_FIELDS: [&str; 3] = ["readme", "readmeFilename", "licenseText"];

/// Dependency groups a manifest can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    Dependencies,
    DevDependencies,
    PeerDependencies,
    OptionalDependencies,
}

impl DependencyKind {
    /// Stable string form used in dependency rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "dev_dependencies",
            Self::PeerDependencies => "peer_dependencies",
            Self::OptionalDependencies => "optional_dependencies",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `dist` object npm attaches to each published version.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
}

/// A parsed `package.json` document or version-manifest fragment.
///
/// Fragments (as sent in deprecation payloads) may be sparse, so `name` and
/// `version` default to empty strings rather than failing the parse.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    /// npm lifecycle scripts. Defaults to `{}`; the coherence check compares
    /// this object against the previously recorded one.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub scripts: Map<String, Value>,

    /// Deprecation message. `Some("")` un-deprecates; absent means no change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,

    #[serde(
        rename = "devDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub dev_dependencies: BTreeMap<String, String>,

    #[serde(
        rename = "peerDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub peer_dependencies: BTreeMap<String, String>,

    #[serde(
        rename = "optionalDependencies",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub optional_dependencies: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<DistInfo>,

    /// Fields the pipeline carries but does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Parse a manifest from raw JSON bytes.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| crate::Error::ManifestParse(e.to_string()))
    }

    /// Copy of this manifest with the [`FILTERED_FIELDS`] removed.
    pub fn filtered(&self) -> Self {
        let mut manifest = self.clone();
        for field in FILTERED_FIELDS {
            manifest.extra.remove(field);
        }
        manifest
    }

    /// The manifest as a JSON value. Key order is stable (sorted), so the
    /// serialized form is reproducible.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Non-empty dependency groups, in declaration-kind order.
    pub fn dependency_groups(&self) -> Vec<(DependencyKind, &BTreeMap<String, String>)> {
        [
            (DependencyKind::Dependencies, &self.dependencies),
            (DependencyKind::DevDependencies, &self.dev_dependencies),
            (DependencyKind::PeerDependencies, &self.peer_dependencies),
            (
                DependencyKind::OptionalDependencies,
                &self.optional_dependencies,
            ),
        ]
        .into_iter()
        .filter(|(_, deps)| !deps.is_empty())
        .collect()
    }
}
