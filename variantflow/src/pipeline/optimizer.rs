//! Best-effort per-variant optimization.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::VariantKind;

/// An optimization attempt failed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct OptimizeError {
    /// Human-readable cause.
    pub message: String,
}

impl OptimizeError {
    /// Creates a new optimize error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Shrinks or recompresses a rendition without changing its dimensions.
///
/// Optimization is a non-essential enhancement: a failed attempt is
/// logged, the unoptimized bytes are kept, and the pipeline proceeds.
/// This is the one step whose failure never triggers compensation.
#[async_trait]
pub trait VariantOptimizer: Send + Sync {
    /// Returns an optimized replacement for `bytes`.
    async fn optimize(&self, kind: VariantKind, bytes: &[u8]) -> Result<Vec<u8>, OptimizeError>;
}

/// Optimizer that returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOptimizer;

impl NoopOptimizer {
    /// Creates a new noop optimizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VariantOptimizer for NoopOptimizer {
    async fn optimize(&self, _kind: VariantKind, bytes: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        Ok(bytes.to_vec())
    }
}
