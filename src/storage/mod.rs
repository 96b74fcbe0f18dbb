//! Distribution file storage
//!
//! Uploaded release files are written under a storage root, one directory per
//! project. The database keeps the storage-relative path of each file.

pub mod filesystem;

pub use filesystem::FilesystemStore;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Facts about a file after it has been written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Storage-relative path (`{project}/{filename}`)
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Lower-case hex SHA-256 of the contents
    pub sha256: String,
}

/// Storage backend for distribution files
#[async_trait]
pub trait DistributionStore: Send + Sync {
    /// Returns the name of this backend
    fn name(&self) -> &str;

    /// Write a file for a project, replacing any file at the same path
    async fn save(
        &self,
        project: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<StoredFile, StorageError>;

    /// Read a stored file by its storage-relative path
    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError>;

    /// Delete a stored file; deleting a missing file is not an error
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Lower-case hex SHA-256 of a byte slice
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check that a name can be used as a single path component
pub fn validate_path_component(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.len() > 255;

    if invalid {
        return Err(StorageError::InvalidFilename(name.to_string()));
    }
    Ok(())
}
