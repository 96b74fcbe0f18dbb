//! Filesystem-based distribution storage
//!
//! Files live at `{base_path}/{normalized project}/{filename}`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::error::StorageError;
use crate::models::normalize_name;

use super::{sha256_hex, validate_path_component, DistributionStore, StoredFile};

/// Filesystem-based distribution store
pub struct FilesystemStore {
    base_path: PathBuf,
}

impl FilesystemStore {
    /// Creates a new FilesystemStore rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Creates a new FilesystemStore and initializes the base directory
    pub async fn new_with_init(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self::new(base_path);
        fs::create_dir_all(&store.base_path).await?;
        Ok(store)
    }

    /// Returns the storage root
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a storage-relative path, rejecting anything outside the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.base_path.clone();
        let mut components = 0;

        for component in path.split('/') {
            validate_path_component(component)?;
            resolved.push(component);
            components += 1;
        }

        if components != 2 {
            return Err(StorageError::InvalidFilename(path.to_string()));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl DistributionStore for FilesystemStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn save(
        &self,
        project: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<StoredFile, StorageError> {
        let relative = format!("{}/{}", normalize_name(project), filename);
        let target = self.resolve(&relative)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a sibling first so readers never see a partial file
        let partial = target.with_file_name(format!(".{}.partial", filename));
        fs::write(&partial, &data).await?;
        fs::rename(&partial, &target).await?;

        tracing::debug!(path = %relative, size = data.len(), "Stored distribution file");

        Ok(StoredFile {
            path: relative,
            size: data.len() as u64,
            sha256: sha256_hex(&data),
        })
    }

    async fn read(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        let target = self.resolve(path)?;

        match fs::read(&target).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;

        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
