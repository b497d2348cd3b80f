//! Storage backend contract and the retry wrapper every tier goes through.
//!
//! Three backend roles exist: the durable local store, the remote object
//! store, and the edge distribution layer. All three share one contract:
//! `write` returns an opaque [`Location`] and `delete` is idempotent
//! (deleting an absent key is success), because compensation may repeat a
//! prior partial delete.

mod local;
mod memory;

pub use local::LocalDiskStore;
pub use memory::InMemoryBackend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::errors::{BackendError, PipelineStep};
use crate::retry::{ErrorClass, RetryError, RetryPolicy};

/// The three backend roles the pipeline writes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Durable local store; the first tier written.
    Durable,
    /// Remote object store.
    Object,
    /// Edge distribution layer.
    Edge,
}

impl BackendKind {
    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable-store",
            Self::Object => "object-store",
            Self::Edge => "edge-publisher",
        }
    }

    /// The forward-pass step that writes through this tier.
    #[must_use]
    pub const fn write_step(self) -> PipelineStep {
        match self {
            Self::Durable => PipelineStep::DurableWrite,
            Self::Object => PipelineStep::ObjectStoreWrite,
            Self::Edge => PipelineStep::EdgePublish,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque handle to a written object.
///
/// Meaningful only to the backend that issued it; the orchestrator only
/// threads it into the record and back into `delete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The issuing tier.
    pub backend: BackendKind,
    /// The key the object was written under.
    pub key: String,
    /// Backend-specific URI (a path, a remote key, a public URL).
    pub uri: String,
}

impl Location {
    /// Creates a new location handle.
    #[must_use]
    pub fn new(backend: BackendKind, key: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            uri: uri.into(),
        }
    }
}

/// The contract shared by all three backend roles.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which tier this backend serves.
    fn kind(&self) -> BackendKind;

    /// Writes `bytes` under `key`, returning an opaque location handle.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError>;

    /// Deletes `key`. Deleting an absent key is success.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;
}

/// Classifier deciding whether a backend error is worth retrying.
pub type BackendClassifier = Arc<dyn Fn(&BackendError) -> ErrorClass + Send + Sync>;

/// Wraps a backend so every `write` and `delete` runs through one
/// [`RetryPolicy`] with a backend-specific classifier.
pub struct RetryingBackend {
    inner: Arc<dyn StorageBackend>,
    policy: RetryPolicy,
    classifier: BackendClassifier,
}

impl RetryingBackend {
    /// Wraps `inner` with the default classifier
    /// ([`BackendError::class`]).
    #[must_use]
    pub fn new(inner: Arc<dyn StorageBackend>, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            classifier: Arc::new(BackendError::class),
        }
    }

    /// Overrides the error classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: BackendClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    fn fold(error: RetryError<BackendError>) -> BackendError {
        if error.attempts <= 1 {
            error.last
        } else {
            BackendError::Exhausted {
                attempts: error.attempts,
                source: Box::new(error.last),
            }
        }
    }
}

#[async_trait]
impl StorageBackend for RetryingBackend {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<Location, BackendError> {
        self.policy
            .execute(|| self.inner.write(key, bytes), |e| (self.classifier)(e))
            .await
            .map_err(Self::fold)
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.policy
            .execute(|| self.inner.delete(key), |e| (self.classifier)(e))
            .await
            .map_err(Self::fold)
    }
}

impl fmt::Debug for RetryingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingBackend")
            .field("kind", &self.kind())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::testing::FlakyBackend;

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::new()
                .with_max_attempts(max_attempts)
                .with_base_delay_ms(1),
        )
    }

    #[tokio::test]
    async fn test_retries_through_transient_failures() {
        let flaky = Arc::new(FlakyBackend::new(BackendKind::Object, 2));
        let backend = RetryingBackend::new(flaky.clone(), fast_policy(5));

        let location = backend.write("a/tiny.bin", b"data").await.unwrap();
        assert_eq!(location.backend, BackendKind::Object);
        assert_eq!(flaky.write_attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_attempt_count() {
        let flaky = Arc::new(FlakyBackend::new(BackendKind::Object, usize::MAX));
        let backend = RetryingBackend::new(flaky.clone(), fast_policy(3));

        let err = backend.write("a/tiny.bin", b"data").await.unwrap_err();
        assert!(matches!(err, BackendError::Exhausted { attempts: 3, .. }));
        assert_eq!(flaky.write_attempts(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let inner = Arc::new(crate::testing::FailingBackend::permanent(
            BackendKind::Edge,
        ));
        let backend = RetryingBackend::new(inner.clone(), fast_policy(5));

        let err = backend.write("a/tiny.bin", b"data").await.unwrap_err();
        assert!(matches!(err, BackendError::Permanent { .. }));
        assert_eq!(inner.write_attempts(), 1);
    }

    #[tokio::test]
    async fn test_custom_classifier_can_mark_everything_fatal() {
        let flaky = Arc::new(FlakyBackend::new(BackendKind::Object, usize::MAX));
        let backend = RetryingBackend::new(flaky.clone(), fast_policy(5))
            .with_classifier(Arc::new(|_| ErrorClass::Fatal));

        let err = backend.write("a/tiny.bin", b"data").await.unwrap_err();
        assert!(matches!(err, BackendError::Transient { .. }));
        assert_eq!(flaky.write_attempts(), 1);
    }
}
