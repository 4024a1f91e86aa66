//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("invalid package status: {0}")]
    InvalidStatus(String),

    #[error("invalid package file status: {0}")]
    InvalidFileStatus(String),

    #[error("invalid package type: {0}")]
    InvalidPackageType(String),

    #[error("manifest parse error: {0}")]
    ManifestParse(String),

    #[error("publish payload parse error: {0}")]
    PayloadParse(String),

    #[error("invalid base64 attachment: {0}")]
    InvalidBase64(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
