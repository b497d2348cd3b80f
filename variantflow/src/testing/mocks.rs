//! Fault-injecting collaborator doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::core::{ArtifactRecord, Dimensions, VariantKind};
use crate::derivative::{SubsampleTransformer, TransformError, VariantTransformer};
use crate::errors::{BackendError, MetadataError};
use crate::metadata::MetadataStore;
use crate::pipeline::{OptimizeError, VariantOptimizer};
use crate::storage::{BackendKind, InMemoryBackend, Location, StorageBackend};

/// Backend whose first N writes fail transiently, then delegates to an
/// in-memory backend.
#[derive(Debug)]
pub struct FlakyBackend {
    inner: InMemoryBackend,
    failures: usize,
    write_attempts: AtomicUsize,
}

impl FlakyBackend {
    /// Creates a backend that fails the first `failures` write attempts.
    #[must_use]
    pub fn new(kind: BackendKind, failures: usize) -> Self {
        Self {
            inner: InMemoryBackend::new(kind, format!("mem://{}", kind.as_str())),
            failures,
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// Total write attempts seen, failed ones included.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FlakyBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            return Err(BackendError::transient("injected transient failure"));
        }
        self.inner.write(key, bytes).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.inner.delete(key).await
    }
}

/// Backend whose writes always fail. Deletes succeed, so compensation
/// through this backend is a no-op.
#[derive(Debug)]
pub struct FailingBackend {
    kind: BackendKind,
    permanent: bool,
    write_attempts: AtomicUsize,
}

impl FailingBackend {
    /// Writes fail with a permanent error.
    #[must_use]
    pub fn permanent(kind: BackendKind) -> Self {
        Self {
            kind,
            permanent: true,
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// Writes fail with a transient error.
    #[must_use]
    pub fn transient(kind: BackendKind) -> Self {
        Self {
            kind,
            permanent: false,
            write_attempts: AtomicUsize::new(0),
        }
    }

    /// Total write attempts seen.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FailingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn write(&self, _key: &str, _bytes: &[u8]) -> Result<Location, BackendError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if self.permanent {
            Err(BackendError::permanent("injected permanent failure"))
        } else {
            Err(BackendError::transient("injected transient failure"))
        }
    }

    async fn delete(&self, _key: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Backend that accepts a fixed number of writes, then fails permanently.
///
/// The successful writes land in an inspectable in-memory backend.
/// Deletes delegate unless [`Self::with_failing_deletes`] is set, in which
/// case they fail permanently while still being counted.
#[derive(Debug)]
pub struct FailAfterBackend {
    inner: InMemoryBackend,
    allowed: usize,
    fail_deletes: bool,
    write_attempts: AtomicUsize,
    delete_attempts: AtomicUsize,
}

impl FailAfterBackend {
    /// Creates a backend that accepts `allowed` writes.
    #[must_use]
    pub fn new(kind: BackendKind, allowed: usize) -> Self {
        Self {
            inner: InMemoryBackend::new(kind, format!("mem://{}", kind.as_str())),
            allowed,
            fail_deletes: false,
            write_attempts: AtomicUsize::new(0),
            delete_attempts: AtomicUsize::new(0),
        }
    }

    /// Makes deletes fail as well, for exercising compensation failures.
    #[must_use]
    pub fn with_failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    /// The in-memory backend holding the accepted writes.
    #[must_use]
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    /// Total write attempts seen.
    #[must_use]
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// Total delete attempts seen.
    #[must_use]
    pub fn delete_attempts(&self) -> usize {
        self.delete_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for FailAfterBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError> {
        let attempt = self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.allowed {
            return Err(BackendError::permanent("injected write cutoff"));
        }
        self.inner.write(key, bytes).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.delete_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes {
            return Err(BackendError::permanent("injected delete failure"));
        }
        self.inner.delete(key).await
    }
}

/// Backend that trips a cancellation token after its Nth successful write.
#[derive(Debug)]
pub struct TripwireBackend {
    inner: InMemoryBackend,
    token: Arc<CancellationToken>,
    trip_after: usize,
    writes: AtomicUsize,
}

impl TripwireBackend {
    /// Creates a backend that cancels `token` once `trip_after` writes
    /// have succeeded.
    #[must_use]
    pub fn new(kind: BackendKind, token: Arc<CancellationToken>, trip_after: usize) -> Self {
        Self {
            inner: InMemoryBackend::new(kind, format!("mem://{}", kind.as_str())),
            token,
            trip_after,
            writes: AtomicUsize::new(0),
        }
    }

    /// The in-memory backend holding the writes.
    #[must_use]
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }
}

#[async_trait]
impl StorageBackend for TripwireBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError> {
        let location = self.inner.write(key, bytes).await?;
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.trip_after {
            self.token.cancel("tripwire");
        }
        Ok(location)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.inner.delete(key).await
    }
}

/// Transformer that fails renditions with a specific target width and
/// delegates the rest.
#[derive(Debug)]
pub struct FailingTransformer {
    width: u32,
    inner: SubsampleTransformer,
}

impl FailingTransformer {
    /// Fails every transform whose target width is `width`.
    #[must_use]
    pub fn for_width(width: u32) -> Self {
        Self {
            width,
            inner: SubsampleTransformer::new(),
        }
    }
}

#[async_trait]
impl VariantTransformer for FailingTransformer {
    async fn transform(
        &self,
        source: &[u8],
        from: Dimensions,
        to: Dimensions,
    ) -> Result<Vec<u8>, TransformError> {
        if to.width == self.width {
            return Err(TransformError::new("injected transform failure"));
        }
        self.inner.transform(source, from, to).await
    }
}

/// Optimizer that fails for one variant kind and passes the rest through
/// unchanged.
#[derive(Debug)]
pub struct FailingOptimizer {
    target: VariantKind,
}

impl FailingOptimizer {
    /// Fails optimization for `target`.
    #[must_use]
    pub fn for_kind(target: VariantKind) -> Self {
        Self { target }
    }
}

#[async_trait]
impl VariantOptimizer for FailingOptimizer {
    async fn optimize(&self, kind: VariantKind, bytes: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        if kind == self.target {
            return Err(OptimizeError::new("injected optimization failure"));
        }
        Ok(bytes.to_vec())
    }
}

/// Metadata store whose saves always fail.
#[derive(Debug, Default)]
pub struct FailingMetadataStore;

impl FailingMetadataStore {
    /// Creates the store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataStore for FailingMetadataStore {
    async fn save(&self, _record: &ArtifactRecord) -> Result<(), MetadataError> {
        Err(MetadataError::store("injected metadata failure"))
    }

    async fn get(&self, id: Uuid) -> Result<ArtifactRecord, MetadataError> {
        Err(MetadataError::NotFound(id))
    }

    async fn delete(&self, _id: Uuid) -> Result<(), MetadataError> {
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ArtifactRecord>, MetadataError> {
        Ok(Vec::new())
    }
}
