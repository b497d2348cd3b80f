//! Durable local filesystem store.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BackendKind, Location, StorageBackend};
use crate::errors::BackendError;

/// Filesystem-backed durable store rooted at a directory.
///
/// Keys may contain `/` separators; parent directories are created on
/// demand. Deletes of absent keys succeed.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    /// Creates a store rooted at `root`. The directory is created lazily
    /// on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn classify_io(error: &std::io::Error, action: &str, key: &str) -> BackendError {
        let message = format!("{action} '{key}': {error}");
        match error.kind() {
            ErrorKind::PermissionDenied | ErrorKind::InvalidInput => {
                BackendError::permanent(message)
            }
            _ => BackendError::transient(message),
        }
    }
}

#[async_trait]
impl StorageBackend for LocalDiskStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Durable
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::classify_io(&e, "create parent for", key))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Self::classify_io(&e, "write", key))?;

        Ok(Location::new(
            BackendKind::Durable,
            key,
            path.display().to_string(),
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::classify_io(&e, "delete", key)),
        }
    }
}
