//! Core domain types for the Amphora npm-compatible package registry.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Package identity, type, and lifecycle status
//! - Parsed `package.json` manifests and their filtered form
//! - The npm publish payload (`versions`, `dist-tags`, `_attachments`)
//! - Registry configuration
//! - Shared error types

pub mod config;
pub mod error;
pub mod manifest;
pub mod package;
pub mod publish;

pub use config::RegistryConfig;
pub use error::{Error, Result};
pub use manifest::{DependencyKind, DistInfo, PackageManifest};
pub use package::{PackageFileStatus, PackageStatus, PackageType, ProjectId};
pub use publish::{Attachment, PublishRequest};

/// Default maximum size of a `package.json` entry inside a tarball: 4 MiB.
pub const MAX_MANIFEST_ENTRY_SIZE: u64 = 4 * 1024 * 1024;

/// Default maximum decoded size of an uploaded package tarball: 500 MiB.
pub const MAX_PACKAGE_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Default maximum serialized size of a stored metadatum `package_json`.
pub const MAX_METADATA_JSON_SIZE: usize = 20_000;
