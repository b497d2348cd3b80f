//! Per-run scratch space for generated derivatives.

use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A per-run staging directory.
///
/// Generated derivatives live here between generation and the durable
/// write. The directory is removed on both the success and the
/// compensation path; removal of an already-absent directory succeeds.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Creates the staging directory for one run under `root`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be
    /// created.
    pub async fn create(root: &Path, run_id: Uuid) -> io::Result<Self> {
        let dir = root.join(run_id.to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// The staging directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a staged file and returns its path.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error on write failure.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Number of staged files currently present.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be read;
    /// an absent directory counts as empty.
    pub async fn file_count(&self) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        while entries.next_entry().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    /// Removes the staging directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error; an already-absent directory is
    /// success.
    pub async fn cleanup(&self) -> io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_write_cleanup() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path(), Uuid::new_v4()).await.unwrap();

        let path = staging.write("tiny.bin", b"data").await.unwrap();
        assert!(path.exists());
        assert_eq!(staging.file_count().await.unwrap(), 1);

        staging.cleanup().await.unwrap();
        assert!(!staging.dir().exists());
        assert_eq!(staging.file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path(), Uuid::new_v4()).await.unwrap();

        staging.cleanup().await.unwrap();
        staging.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn test_runs_get_disjoint_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = StagingArea::create(root.path(), Uuid::new_v4()).await.unwrap();
        let b = StagingArea::create(root.path(), Uuid::new_v4()).await.unwrap();
        assert_ne!(a.dir(), b.dir());
    }
}
