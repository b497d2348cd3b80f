//! The black-box transform capability behind derivative generation.

use async_trait::async_trait;
use thiserror::Error;

use crate::core::Dimensions;

/// A transform task failed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransformError {
    /// Human-readable cause.
    pub message: String,
}

impl TransformError {
    /// Creates a new transform error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Produces a smaller/different-dimension rendition of an artifact.
///
/// The concrete algorithm is a collaborator injected at construction time;
/// the pipeline only depends on this contract.
#[async_trait]
pub trait VariantTransformer: Send + Sync {
    /// Transforms `source` from `from` dimensions to `to` dimensions.
    async fn transform(
        &self,
        source: &[u8],
        from: Dimensions,
        to: Dimensions,
    ) -> Result<Vec<u8>, TransformError>;
}

/// Naive transformer that subsamples the source buffer proportionally to
/// the area reduction. Not a real resampler; suitable for smoke runs and
/// tests where only byte volumes matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsampleTransformer;

impl SubsampleTransformer {
    /// Creates a new subsample transformer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VariantTransformer for SubsampleTransformer {
    async fn transform(
        &self,
        source: &[u8],
        from: Dimensions,
        to: Dimensions,
    ) -> Result<Vec<u8>, TransformError> {
        if source.is_empty() {
            return Err(TransformError::new("empty source payload"));
        }
        if from.area() == 0 {
            return Err(TransformError::new("source has zero area"));
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = (to.area() as f64 / from.area() as f64).min(1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target_len = ((source.len() as f64 * ratio).ceil() as usize).max(1);

        let step = (source.len() / target_len).max(1);
        Ok(source.iter().step_by(step).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subsample_shrinks_proportionally() {
        let transformer = SubsampleTransformer::new();
        let source = vec![1u8; 4000];
        let out = transformer
            .transform(&source, Dimensions::new(2000, 1500), Dimensions::new(640, 480))
            .await
            .unwrap();

        assert!(!out.is_empty());
        assert!(out.len() < source.len());
    }

    #[tokio::test]
    async fn test_subsample_never_grows() {
        let transformer = SubsampleTransformer::new();
        let source = vec![9u8; 100];
        let out = transformer
            .transform(&source, Dimensions::new(100, 100), Dimensions::new(100, 100))
            .await
            .unwrap();
        assert!(out.len() <= source.len());
    }

    #[tokio::test]
    async fn test_subsample_rejects_empty_source() {
        let transformer = SubsampleTransformer::new();
        let err = transformer
            .transform(&[], Dimensions::new(10, 10), Dimensions::new(5, 5))
            .await
            .unwrap_err();
        assert!(err.message.contains("empty"));
    }
}
