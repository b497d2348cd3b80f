//! Metadata store contract and the in-memory implementation.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::core::ArtifactRecord;
use crate::errors::MetadataError;

/// Keyed store for [`ArtifactRecord`]s.
///
/// An external collaborator with at-most-once durable-write semantics per
/// call: a partial record is never observable through this boundary. Must
/// be safe for concurrent use by simultaneous pipeline runs.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persists a record.
    async fn save(&self, record: &ArtifactRecord) -> Result<(), MetadataError>;

    /// Fetches a record by id.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] when no record exists.
    async fn get(&self, id: Uuid) -> Result<ArtifactRecord, MetadataError>;

    /// Deletes a record. Deleting an absent record is success.
    async fn delete(&self, id: Uuid) -> Result<(), MetadataError>;

    /// Lists all records.
    async fn list(&self) -> Result<Vec<ArtifactRecord>, MetadataError>;
}

/// Concurrent in-memory metadata store.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: DashMap<Uuid, ArtifactRecord>,
}

impl InMemoryMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn save(&self, record: &ArtifactRecord) -> Result<(), MetadataError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<ArtifactRecord, MetadataError> {
        self.records
            .get(&id)
            .map(|entry| entry.clone())
            .ok_or(MetadataError::NotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), MetadataError> {
        self.records.remove(&id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ArtifactRecord>, MetadataError> {
        Ok(self.records.iter().map(|entry| entry.clone()).collect())
    }
}
