//! The pipeline orchestrator and its builder.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::optimizer::{NoopOptimizer, VariantOptimizer};
use super::state::{PipelinePhase, PipelineState};
use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{
    probe_dimensions, ArtifactRecord, ArtifactRequest, SizeClass, Variant, VariantKind,
};
use crate::derivative::{DerivativeGenerator, StagingArea, VariantTransformer};
use crate::errors::{
    BackendKindMismatch, CompensationError, PipelineError, PipelineStep, ProcessError,
    RemovalError,
};
use crate::metadata::MetadataStore;
use crate::retry::RetryPolicy;
use crate::storage::{BackendKind, RetryingBackend, StorageBackend};
use crate::utils::{now_utc, sha256_hex};

/// The orchestrator could not be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A required collaborator was not supplied.
    #[error("missing required component: {0}")]
    Missing(&'static str),

    /// A backend was supplied for the wrong tier.
    #[error(transparent)]
    WrongTier(#[from] BackendKindMismatch),
}

/// Builder for [`PipelineOrchestrator`].
///
/// Each raw backend is wrapped in a [`RetryingBackend`] with the tier's
/// retry tuning from the config, so callers supply plain backends and the
/// orchestrator sees only retried ones.
#[derive(Default)]
pub struct PipelineBuilder {
    durable: Option<Arc<dyn StorageBackend>>,
    object: Option<Arc<dyn StorageBackend>>,
    edge: Option<Arc<dyn StorageBackend>>,
    metadata: Option<Arc<dyn MetadataStore>>,
    transformer: Option<Arc<dyn VariantTransformer>>,
    optimizer: Option<Arc<dyn VariantOptimizer>>,
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Creates an empty builder with the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the durable local store.
    #[must_use]
    pub fn with_durable(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.durable = Some(backend);
        self
    }

    /// Sets the remote object store.
    #[must_use]
    pub fn with_object(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.object = Some(backend);
        self
    }

    /// Sets the edge distribution layer.
    #[must_use]
    pub fn with_edge(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.edge = Some(backend);
        self
    }

    /// Sets the metadata store.
    #[must_use]
    pub fn with_metadata(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    /// Sets the derivative transformer.
    #[must_use]
    pub fn with_transformer(mut self, transformer: Arc<dyn VariantTransformer>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Sets the optimizer. Defaults to [`NoopOptimizer`].
    #[must_use]
    pub fn with_optimizer(mut self, optimizer: Arc<dyn VariantOptimizer>) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    /// Sets the pipeline config.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Assembles the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError`] if a required collaborator is missing or a
    /// backend was supplied for the wrong tier.
    pub fn build(self) -> Result<PipelineOrchestrator, BuildError> {
        let durable = self.durable.ok_or(BuildError::Missing("durable backend"))?;
        let object = self.object.ok_or(BuildError::Missing("object backend"))?;
        let edge = self.edge.ok_or(BuildError::Missing("edge backend"))?;
        let metadata = self.metadata.ok_or(BuildError::Missing("metadata store"))?;
        let transformer = self.transformer.ok_or(BuildError::Missing("transformer"))?;
        let optimizer = self
            .optimizer
            .unwrap_or_else(|| Arc::new(NoopOptimizer::new()));

        check_tier(&durable, BackendKind::Durable)?;
        check_tier(&object, BackendKind::Object)?;
        check_tier(&edge, BackendKind::Edge)?;

        let config = self.config;
        let wrap = |inner: Arc<dyn StorageBackend>, retry| -> Arc<dyn StorageBackend> {
            Arc::new(RetryingBackend::new(inner, RetryPolicy::new(retry)))
        };

        Ok(PipelineOrchestrator {
            durable: wrap(durable, config.durable_retry.clone()),
            object: wrap(object, config.object_retry.clone()),
            edge: wrap(edge, config.edge_retry.clone()),
            metadata,
            generator: DerivativeGenerator::new(transformer),
            optimizer,
            config,
        })
    }
}

fn check_tier(
    backend: &Arc<dyn StorageBackend>,
    expected: BackendKind,
) -> Result<(), BackendKindMismatch> {
    if backend.kind() == expected {
        Ok(())
    } else {
        Err(BackendKindMismatch {
            expected,
            actual: backend.kind(),
        })
    }
}

/// Coordinates one artifact through probe, generation, optimization, the
/// three storage tiers, and the metadata save.
///
/// On any step failure the orchestrator walks its committed-step log in
/// reverse and deletes every key it wrote, then reports the triggering
/// error together with whatever compensation failures occurred. The
/// orchestrator holds no cross-run state; concurrent runs only share the
/// injected collaborators.
pub struct PipelineOrchestrator {
    durable: Arc<dyn StorageBackend>,
    object: Arc<dyn StorageBackend>,
    edge: Arc<dyn StorageBackend>,
    metadata: Arc<dyn MetadataStore>,
    generator: DerivativeGenerator,
    optimizer: Arc<dyn VariantOptimizer>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Processes one artifact to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] naming the failing step, the triggering
    /// error, and any compensation failures; by then every key written
    /// during the run has been deleted (or its failure reported).
    pub async fn process(&self, request: ArtifactRequest) -> Result<ArtifactRecord, ProcessError> {
        self.process_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Processes one artifact, checking `cancel` before every
    /// externally-visible step.
    ///
    /// Cancellation observed mid-run is treated exactly like a fatal
    /// failure of the step about to execute: committed work is unwound.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] as for [`Self::process`].
    pub async fn process_with_cancel(
        &self,
        request: ArtifactRequest,
        cancel: &CancellationToken,
    ) -> Result<ArtifactRecord, ProcessError> {
        let id = Uuid::new_v4();
        let created_at = now_utc();
        let mut state = PipelineState::new();

        debug!(%id, phase = %PipelinePhase::Validated, content_type = %request.content_type, "run started");

        // Nothing external has been touched yet; failures here unwind
        // nothing.
        let dimensions = match probe_dimensions(&request.bytes) {
            Ok(dims) => dims,
            Err(e) => {
                return Err(self
                    .unwind(
                        None,
                        state,
                        PipelineStep::DimensionProbe,
                        PipelineError::InvalidArtifact(e.to_string()),
                    )
                    .await);
            }
        };
        let checksum = sha256_hex(&request.bytes);
        debug!(%id, phase = %PipelinePhase::DimensionsExtracted, %dimensions, "source probed");

        if let Err(e) = self.check_cancel(cancel) {
            return Err(self
                .unwind(None, state, PipelineStep::DerivativeGeneration, e)
                .await);
        }

        let staging = match StagingArea::create(&self.config.staging_root, id).await {
            Ok(staging) => staging,
            Err(e) => {
                return Err(self
                    .unwind(
                        None,
                        state,
                        PipelineStep::DerivativeGeneration,
                        PipelineError::Internal(format!("cannot create staging area: {e}")),
                    )
                    .await);
            }
        };

        // The generator removes its own staged output on failure.
        let mut variants = match self
            .generator
            .generate_all(&staging, &request.bytes, dimensions)
            .await
        {
            Ok(variants) => variants,
            Err(e) => {
                return Err(self
                    .unwind(
                        Some(&staging),
                        state,
                        PipelineStep::DerivativeGeneration,
                        PipelineError::Derivative(e),
                    )
                    .await);
            }
        };
        debug!(%id, phase = %PipelinePhase::DerivativesGenerated, count = variants.len(), "derivatives staged");

        let mut original = Variant::new(VariantKind::Original, dimensions, request.byte_len());
        let mut original_bytes: Arc<Vec<u8>> = Arc::clone(&request.bytes);
        let mut derived_bytes: BTreeMap<SizeClass, Vec<u8>> = BTreeMap::new();
        for class in SizeClass::ALL {
            let Some(path) = variants.get(&class).and_then(|v| v.staged_path.clone()) else {
                return Err(self
                    .unwind(
                        Some(&staging),
                        state,
                        PipelineStep::DerivativeGeneration,
                        PipelineError::Internal(format!("no staged output for {class}")),
                    )
                    .await);
            };
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    derived_bytes.insert(class, bytes);
                }
                Err(e) => {
                    return Err(self
                        .unwind(
                            Some(&staging),
                            state,
                            PipelineStep::DerivativeGeneration,
                            PipelineError::Internal(format!(
                                "cannot read staged output for {class}: {e}"
                            )),
                        )
                        .await);
                }
            }
        }

        // Optimization is best-effort: a failure keeps the unoptimized
        // bytes and the run continues.
        match self
            .optimizer
            .optimize(VariantKind::Original, &original_bytes)
            .await
        {
            Ok(optimized) => {
                original.byte_len = optimized.len() as u64;
                original_bytes = Arc::new(optimized);
                original.mark_optimized();
            }
            Err(e) => {
                warn!(%id, kind = %VariantKind::Original, error = %e, "optimization failed; keeping unoptimized bytes");
            }
        }
        for class in SizeClass::ALL {
            let Some(bytes) = derived_bytes.get(&class) else {
                continue;
            };
            match self
                .optimizer
                .optimize(VariantKind::Derived(class), bytes)
                .await
            {
                Ok(optimized) => {
                    if let Some(variant) = variants.get_mut(&class) {
                        variant.byte_len = optimized.len() as u64;
                        variant.mark_optimized();
                    }
                    derived_bytes.insert(class, optimized);
                }
                Err(e) => {
                    warn!(%id, kind = %class, error = %e, "optimization failed; keeping unoptimized bytes");
                }
            }
        }
        debug!(%id, phase = %PipelinePhase::Optimized, "optimization pass done");

        for (backend, phase) in [
            (&self.durable, PipelinePhase::DurablyStored),
            (&self.object, PipelinePhase::ObjectStored),
            (&self.edge, PipelinePhase::Published),
        ] {
            if let Err((step, error)) = self
                .write_tier(
                    backend,
                    id,
                    &mut original,
                    &original_bytes,
                    &mut variants,
                    &derived_bytes,
                    &mut state,
                    cancel,
                )
                .await
            {
                return Err(self.unwind(Some(&staging), state, step, error).await);
            }
            debug!(%id, phase = %phase, tier = %backend.kind(), "tier committed");
        }

        if let Err(e) = self.check_cancel(cancel) {
            return Err(self
                .unwind(Some(&staging), state, PipelineStep::MetadataSave, e)
                .await);
        }

        let record = ArtifactRecord {
            id,
            content_type: request.content_type,
            uploaded_by: request.uploaded_by,
            tags: request.tags,
            dimensions,
            checksum,
            original,
            variants,
            created_at,
            processed_at: now_utc(),
        };
        if let Err(e) = self.metadata.save(&record).await {
            return Err(self
                .unwind(
                    Some(&staging),
                    state,
                    PipelineStep::MetadataSave,
                    PipelineError::Metadata(e),
                )
                .await);
        }

        if let Err(e) = staging.cleanup().await {
            warn!(%id, error = %e, "failed to remove staging directory after success");
        }
        debug!(%id, phase = %PipelinePhase::MetadataSaved, "run complete");
        Ok(record)
    }

    /// Fetches a processed record.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`](crate::errors::MetadataError::NotFound)
    /// when no record exists.
    pub async fn get_record(&self, id: Uuid) -> Result<ArtifactRecord, crate::errors::MetadataError> {
        self.metadata.get(id).await
    }

    /// Lists all processed records.
    ///
    /// # Errors
    ///
    /// Propagates metadata store failures.
    pub async fn list_records(&self) -> Result<Vec<ArtifactRecord>, crate::errors::MetadataError> {
        self.metadata.list().await
    }

    /// Removes a processed artifact everywhere: edge, then object store,
    /// then durable store, then the metadata record.
    ///
    /// Removal is best-effort in the same sense as compensation: every
    /// sub-delete is attempted and failures are collected, never masked.
    ///
    /// # Errors
    ///
    /// Returns [`RemovalError::NotFound`] when no record exists, or
    /// [`RemovalError::Incomplete`] listing the sub-deletes that failed.
    pub async fn delete_record(&self, id: Uuid) -> Result<(), RemovalError> {
        let record = self
            .metadata
            .get(id)
            .await
            .map_err(|_| RemovalError::NotFound(id))?;

        let mut errors = Vec::new();
        for tier in [BackendKind::Edge, BackendKind::Object, BackendKind::Durable] {
            let backend = self.backend_for(tier);
            let all = std::iter::once(&record.original).chain(record.variants.values());
            for variant in all {
                let Some(location) = variant.location(tier) else {
                    continue;
                };
                if let Err(e) = backend.delete(&location.key).await {
                    warn!(%id, tier = %tier, key = %location.key, error = %e, "removal delete failed");
                    errors.push(CompensationError {
                        step: tier.write_step(),
                        key: location.key.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if let Err(e) = self.metadata.delete(id).await {
            errors.push(CompensationError {
                step: PipelineStep::MetadataSave,
                key: id.to_string(),
                message: e.to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RemovalError::Incomplete { id, errors })
        }
    }

    fn check_cancel(&self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        if cancel.is_cancelled() {
            let reason = cancel
                .reason()
                .unwrap_or_else(|| "no reason given".to_string());
            Err(PipelineError::Cancelled(reason))
        } else {
            Ok(())
        }
    }

    fn backend_for(&self, tier: BackendKind) -> &Arc<dyn StorageBackend> {
        match tier {
            BackendKind::Durable => &self.durable,
            BackendKind::Object => &self.object,
            BackendKind::Edge => &self.edge,
        }
    }

    /// Writes the original and every variant through one tier.
    ///
    /// Keys written before a mid-tier failure are committed to the log so
    /// compensation covers them.
    #[allow(clippy::too_many_arguments)]
    async fn write_tier(
        &self,
        backend: &Arc<dyn StorageBackend>,
        id: Uuid,
        original: &mut Variant,
        original_bytes: &Arc<Vec<u8>>,
        variants: &mut BTreeMap<SizeClass, Variant>,
        derived_bytes: &BTreeMap<SizeClass, Vec<u8>>,
        state: &mut PipelineState,
        cancel: &CancellationToken,
    ) -> Result<(), (PipelineStep, PipelineError)> {
        let step = backend.kind().write_step();
        let mut keys: Vec<String> = Vec::new();

        let mut targets: Vec<(VariantKind, &[u8])> =
            vec![(VariantKind::Original, original_bytes.as_slice())];
        for class in SizeClass::ALL {
            if let Some(bytes) = derived_bytes.get(&class) {
                targets.push((VariantKind::Derived(class), bytes.as_slice()));
            }
        }

        for (kind, bytes) in targets {
            if let Err(e) = self.check_cancel(cancel) {
                state.commit(step, keys);
                return Err((step, e));
            }

            let key = format!("{id}/{kind}.bin");
            let location = match backend.write(&key, bytes).await {
                Ok(location) => location,
                Err(e) => {
                    state.commit(step, keys);
                    return Err((step, PipelineError::Backend(e)));
                }
            };

            let variant = match kind {
                VariantKind::Original => &mut *original,
                VariantKind::Derived(class) => match variants.get_mut(&class) {
                    Some(variant) => variant,
                    None => {
                        state.commit(step, keys);
                        return Err((
                            step,
                            PipelineError::Internal(format!("no variant for class {class}")),
                        ));
                    }
                },
            };
            if let Err(e) = variant.attach(location) {
                keys.push(key);
                state.commit(step, keys);
                return Err((step, PipelineError::Internal(e.to_string())));
            }
            keys.push(key);
        }

        state.commit(step, keys);
        Ok(())
    }

    /// Unwinds a failed run and packages the result.
    ///
    /// The triggering error is always the reported cause; compensation
    /// failures ride alongside it.
    async fn unwind(
        &self,
        staging: Option<&StagingArea>,
        state: PipelineState,
        step: PipelineStep,
        source: PipelineError,
    ) -> ProcessError {
        warn!(phase = %PipelinePhase::Compensating(step), error = %source, "run failed; unwinding");
        let compensation = self.compensate(state).await;

        if let Some(staging) = staging {
            if let Err(e) = staging.cleanup().await {
                warn!(error = %e, "failed to remove staging directory while unwinding");
            }
        }

        warn!(phase = %PipelinePhase::Failed, compensation_errors = compensation.len(), "unwind complete");
        ProcessError {
            step,
            source,
            compensation,
        }
    }

    /// Deletes every committed key, newest step first, keys in reverse
    /// write order. Every delete is attempted; failures are collected.
    async fn compensate(&self, state: PipelineState) -> Vec<CompensationError> {
        let mut errors = Vec::new();
        for entry in state.into_reverse() {
            let Some(tier) = step_tier(entry.step) else {
                continue;
            };
            let backend = self.backend_for(tier);
            for key in entry.keys.into_iter().rev() {
                if let Err(e) = backend.delete(&key).await {
                    warn!(step = %entry.step, %key, error = %e, "compensating delete failed");
                    errors.push(CompensationError {
                        step: entry.step,
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }
        errors
    }
}

const fn step_tier(step: PipelineStep) -> Option<BackendKind> {
    match step {
        PipelineStep::DurableWrite => Some(BackendKind::Durable),
        PipelineStep::ObjectStoreWrite => Some(BackendKind::Object),
        PipelineStep::EdgePublish => Some(BackendKind::Edge),
        _ => None,
    }
}

impl std::fmt::Debug for PipelineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
