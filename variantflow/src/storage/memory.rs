//! In-memory backend for the object-store and edge roles.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{BackendKind, Location, StorageBackend};
use crate::errors::BackendError;

/// Concurrent in-memory backend.
///
/// Serves as the object-store and edge-publisher collaborator in tests and
/// single-process deployments. URIs are the configured prefix joined with
/// the key (e.g. `https://cdn.example/{key}`).
#[derive(Debug)]
pub struct InMemoryBackend {
    kind: BackendKind,
    uri_prefix: String,
    objects: DashMap<String, Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a backend serving the given role.
    #[must_use]
    pub fn new(kind: BackendKind, uri_prefix: impl Into<String>) -> Self {
        Self {
            kind,
            uri_prefix: uri_prefix.into(),
            objects: DashMap::new(),
        }
    }

    /// Number of stored objects.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Returns a copy of the object under `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.get(key).map(|entry| entry.clone())
    }

    /// Whether an object exists under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// All keys starting with `prefix`.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError> {
        self.objects.insert(key.to_string(), bytes.to_vec());
        Ok(Location::new(
            self.kind,
            key,
            format!("{}/{key}", self.uri_prefix),
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        // Absent keys are fine: compensation may repeat a prior delete.
        self.objects.remove(key);
        Ok(())
    }
}
