//! Package identity and lifecycle types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a project, the namespace owning packages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Generate a new random project ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidProjectId(e.to_string()))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ProjectId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectId({})", self.0)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The registry model a package belongs to. Only npm is supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Npm,
}

impl PackageType {
    /// Stable string form used in database rows and lease keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "npm" => Ok(Self::Npm),
            other => Err(crate::Error::InvalidPackageType(other.to_string())),
        }
    }
}

/// Package lifecycle status.
///
/// A package is created `processing` by the orchestrator, transitioned to
/// `default` on successful finalize or to `deprecated` by the deprecation
/// processor, marked `error` on failure, and eventually `pending_destruction`
/// by an external reaper. Only non-pending-destruction packages count toward
/// the `(project, name, version)` uniqueness invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Processing,
    Default,
    Deprecated,
    Error,
    PendingDestruction,
}

impl PackageStatus {
    /// Stable string form used in database rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Default => "default",
            Self::Deprecated => "deprecated",
            Self::Error => "error",
            Self::PendingDestruction => "pending_destruction",
        }
    }

    /// Whether the package is visible to registry consumers and uniqueness
    /// checks.
    pub fn is_current(&self) -> bool {
        !matches!(self, Self::PendingDestruction)
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "processing" => Ok(Self::Processing),
            "default" => Ok(Self::Default),
            "deprecated" => Ok(Self::Deprecated),
            "error" => Ok(Self::Error),
            "pending_destruction" => Ok(Self::PendingDestruction),
            other => Err(crate::Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Package file lifecycle status. A file is never resurrected from `error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageFileStatus {
    Processing,
    Default,
    Error,
}

impl PackageFileStatus {
    /// Stable string form used in database rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Default => "default",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for PackageFileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageFileStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "processing" => Ok(Self::Processing),
            "default" => Ok(Self::Default),
            "error" => Ok(Self::Error),
            other => Err(crate::Error::InvalidFileStatus(other.to_string())),
        }
    }
}
