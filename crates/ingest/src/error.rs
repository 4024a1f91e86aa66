//! Service error taxonomy for the ingestion pipeline.
//!
//! Public entry points return [`ServiceError`], a typed reason plus message,
//! so callers branch on outcomes instead of catching exceptions. Lower-level
//! parsing and extraction failures ([`ExtractionError`], [`MismatchError`])
//! are raised as typed errors and converted exactly once, at the worker
//! boundary, into the same shape.

use std::fmt;
use thiserror::Error;

/// Machine-readable reason carried by every service failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    VersionEmpty,
    PackageAlreadyExists,
    FileTooLarge,
    CouldNotObtainLease,
    AttachmentMissing,
    InvalidAttachment,
    MetadataTooLarge,
    Mismatch,
    ExtractionFailed,
    JsonParserError,
    MissingVersions,
    MissingDeprecatedVersions,
    Unauthorized,
    PackageProtected,
    Internal,
}

impl ErrorReason {
    /// Stable reason code, as surfaced to API layers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VersionEmpty => "version_empty",
            Self::PackageAlreadyExists => "package_already_exists",
            Self::FileTooLarge => "file_too_large",
            Self::CouldNotObtainLease => "could_not_obtain_lease",
            Self::AttachmentMissing => "attachment_missing",
            Self::InvalidAttachment => "invalid_attachment",
            Self::MetadataTooLarge => "metadata_too_large",
            Self::Mismatch => "mismatch",
            Self::ExtractionFailed => "extraction_failed",
            Self::JsonParserError => "json_parser_error",
            Self::MissingVersions => "missing_versions",
            Self::MissingDeprecatedVersions => "missing_deprecated_versions",
            Self::Unauthorized => "unauthorized",
            Self::PackageProtected => "package_protected",
            Self::Internal => "internal",
        }
    }

    /// HTTP-like status the API layer is expected to map this reason to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::PackageAlreadyExists | Self::Unauthorized | Self::PackageProtected => 403,
            Self::Internal => 500,
            _ => 400,
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure result returned by every public service entry point.
#[derive(Debug, Error)]
#[error("{reason}: {message}")]
pub struct ServiceError {
    pub reason: ErrorReason,
    pub message: String,
}

impl ServiceError {
    /// Build a service error.
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    /// Internal error wrapper for infrastructure failures.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorReason::Internal, message)
    }

    /// HTTP-like status for this error.
    pub fn http_status(&self) -> u16 {
        self.reason.http_status()
    }
}

/// Result type for public service entry points.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Raised by the archive entry locator; fatal for the upload being processed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no package.json entry found in archive")]
    ManifestNotFound,

    #[error("package.json entry too large: {size} bytes (max {max})")]
    EntryTooLarge { size: u64, max: u64 },

    #[error("archive read error: {0}")]
    Archive(#[from] std::io::Error),
}

/// Raised by the coherence checker when the embedded manifest disagrees with
/// the package identity supplied at upload time.
#[derive(Debug, Error)]
#[error("package.json does not match package: {} differ", .fields.join(", "))]
pub struct MismatchError {
    pub fields: Vec<&'static str>,
}

/// Raised when the job scheduler can no longer accept work.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler closed")]
    Closed,
}

/// Raised by lease providers on infrastructure failure (contention is a
/// normal `false`, not an error).
#[derive(Debug, Error)]
#[error("lease provider error: {0}")]
pub struct LeaseError(pub String);

impl From<ExtractionError> for ServiceError {
    fn from(err: ExtractionError) -> Self {
        Self::new(ErrorReason::ExtractionFailed, err.to_string())
    }
}

impl From<MismatchError> for ServiceError {
    fn from(err: MismatchError) -> Self {
        Self::new(ErrorReason::Mismatch, err.to_string())
    }
}

impl From<SchedulerError> for ServiceError {
    fn from(err: SchedulerError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<LeaseError> for ServiceError {
    fn from(err: LeaseError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<amphora_metadata::MetadataError> for ServiceError {
    fn from(err: amphora_metadata::MetadataError) -> Self {
        match err {
            amphora_metadata::MetadataError::AlreadyExists(message) => {
                Self::new(ErrorReason::PackageAlreadyExists, message)
            }
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<amphora_storage::StorageError> for ServiceError {
    fn from(err: amphora_storage::StorageError) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err.to_string())
    }
}
