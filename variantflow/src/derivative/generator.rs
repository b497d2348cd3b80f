//! All-or-nothing parallel generation of size-class derivatives.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{StagingArea, TransformError, VariantTransformer};
use crate::core::{Dimensions, SizeClass, Variant, VariantKind};
use crate::errors::DerivativeError;

/// Generates one derivative per size class, in parallel.
///
/// Policy is strict all-or-nothing: a partial derivative set is never an
/// acceptable deliverable. On any task failure the remaining tasks are
/// aborted, staged output of the successful tasks is removed, and a single
/// aggregated error names the failed classes and wraps the first cause.
pub struct DerivativeGenerator {
    transformer: Arc<dyn VariantTransformer>,
}

impl DerivativeGenerator {
    /// Creates a generator around the injected transform capability.
    #[must_use]
    pub fn new(transformer: Arc<dyn VariantTransformer>) -> Self {
        Self { transformer }
    }

    /// Generates a derivative for every size class.
    ///
    /// Each task computes its target dimensions by contain-fit against the
    /// class bounding box (a box larger than the source clamps to the
    /// source), transforms, and stages its output under `staging`. The
    /// tasks share no mutable state and write disjoint files; the only
    /// synchronization point is the aggregation barrier here.
    ///
    /// # Errors
    ///
    /// Returns [`DerivativeError`] if any task fails; by then all staged
    /// output of this run has been removed.
    pub async fn generate_all(
        &self,
        staging: &StagingArea,
        source: &Arc<Vec<u8>>,
        source_dims: Dimensions,
    ) -> Result<BTreeMap<SizeClass, Variant>, DerivativeError> {
        let mut tasks = JoinSet::new();

        for class in SizeClass::ALL {
            let transformer = Arc::clone(&self.transformer);
            let bytes = Arc::clone(source);
            let staging = staging.clone();

            tasks.spawn(async move {
                let target = source_dims.fit_within(class.bounding_box());
                let output = transformer
                    .transform(&bytes, source_dims, target)
                    .await
                    .map_err(|e| (class, e))?;
                let path = staging
                    .write(&format!("{class}.bin"), &output)
                    .await
                    .map_err(|e| {
                        (
                            class,
                            TransformError::new(format!("staging write failed: {e}")),
                        )
                    })?;

                let variant = Variant::new(
                    VariantKind::Derived(class),
                    target,
                    output.len() as u64,
                )
                .with_staged_path(path);
                Ok::<_, (SizeClass, TransformError)>((class, variant))
            });
        }

        let mut variants = BTreeMap::new();
        let mut failed: Vec<SizeClass> = Vec::new();
        let mut first_cause: Option<TransformError> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((class, variant))) => {
                    variants.insert(class, variant);
                }
                Ok(Err((class, error))) => {
                    failed.push(class);
                    if first_cause.is_none() {
                        first_cause = Some(error);
                        tasks.abort_all();
                    }
                }
                Err(join_error) => {
                    // Aborted siblings are expected after the first failure.
                    if !join_error.is_cancelled() && first_cause.is_none() {
                        first_cause = Some(TransformError::new(format!(
                            "generation task panicked: {join_error}"
                        )));
                        tasks.abort_all();
                    }
                }
            }
        }

        if let Some(source_error) = first_cause {
            failed.sort_unstable();
            warn!(
                failed = %failed.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(","),
                error = %source_error,
                "derivative generation failed; discarding staged output"
            );
            if let Err(e) = staging.cleanup().await {
                warn!(error = %e, "failed to remove staging directory");
            }
            return Err(DerivativeError {
                failed,
                source: source_error,
            });
        }

        debug!(count = variants.len(), "derivative generation complete");
        Ok(variants)
    }
}

impl std::fmt::Debug for DerivativeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivativeGenerator").finish_non_exhaustive()
    }
}
