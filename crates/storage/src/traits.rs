//! Storage trait definitions.

use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;

/// Backend-agnostic object store. Keys are `/`-separated relative paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an object, overwriting any existing object at the key.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Fetch an object's full contents.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Validate an object key: non-empty, relative, and free of traversal
/// components.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(StorageError::InvalidKey(format!(
            "absolute path not allowed: {key}"
        )));
    }
    for component in std::path::Path::new(key).components() {
        match component {
            std::path::Component::Normal(_) => {}
            _ => {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("packages/ab/abcd.tgz").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("./a").is_err());
    }
}
