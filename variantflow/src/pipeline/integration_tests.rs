//! End-to-end orchestrator tests with fault-injecting collaborators.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::core::{ArtifactRequest, SizeClass, VariantKind};
use crate::derivative::SubsampleTransformer;
use crate::errors::{BackendError, PipelineError, PipelineStep, RemovalError};
use crate::metadata::{InMemoryMetadataStore, MetadataStore};
use crate::pipeline::{PipelineOrchestrator, VariantOptimizer};
use crate::retry::RetryConfig;
use crate::storage::{BackendKind, InMemoryBackend, StorageBackend};
use crate::testing::{
    synthetic_png, FailAfterBackend, FailingBackend, FailingMetadataStore, FailingOptimizer,
    TripwireBackend,
};
use crate::utils::sha256_hex;

struct Harness {
    durable: Arc<InMemoryBackend>,
    object: Arc<InMemoryBackend>,
    metadata: Arc<InMemoryMetadataStore>,
    staging_root: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        Self {
            durable: Arc::new(InMemoryBackend::new(BackendKind::Durable, "file:///durable")),
            object: Arc::new(InMemoryBackend::new(BackendKind::Object, "mem://object")),
            metadata: Arc::new(InMemoryMetadataStore::new()),
            staging_root: tempfile::tempdir().unwrap(),
        }
    }

    fn config(&self) -> PipelineConfig {
        PipelineConfig::new()
            .with_staging_root(self.staging_root.path())
            .with_uniform_retry(RetryConfig::new().with_max_attempts(3).with_base_delay_ms(1))
    }

    fn pipeline_with_edge(&self, edge: Arc<dyn StorageBackend>) -> PipelineOrchestrator {
        self.pipeline(self.durable.clone(), self.object.clone(), edge, None)
    }

    fn pipeline(
        &self,
        durable: Arc<dyn StorageBackend>,
        object: Arc<dyn StorageBackend>,
        edge: Arc<dyn StorageBackend>,
        optimizer: Option<Arc<dyn VariantOptimizer>>,
    ) -> PipelineOrchestrator {
        let mut builder = PipelineOrchestrator::builder()
            .with_durable(durable)
            .with_object(object)
            .with_edge(edge)
            .with_metadata(self.metadata.clone())
            .with_transformer(Arc::new(SubsampleTransformer::new()))
            .with_config(self.config());
        if let Some(optimizer) = optimizer {
            builder = builder.with_optimizer(optimizer);
        }
        builder.build().unwrap()
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging_root.path())
            .map(|entries| entries.count() == 0)
            .unwrap_or(true)
    }
}

fn edge_backend() -> Arc<InMemoryBackend> {
    Arc::new(InMemoryBackend::new(BackendKind::Edge, "https://cdn.example"))
}

fn request() -> ArtifactRequest {
    ArtifactRequest::new(synthetic_png(2000, 1500, 8192), "image/png", "user-1")
        .with_tags(vec!["avatar".to_string()])
}

#[tokio::test]
async fn test_successful_run_stores_everything_everywhere() {
    let harness = Harness::new();
    let edge = edge_backend();
    let pipeline = harness.pipeline_with_edge(edge.clone());

    let payload = synthetic_png(2000, 1500, 8192);
    let expected_checksum = sha256_hex(&payload);
    let record = pipeline
        .process(ArtifactRequest::new(payload, "image/png", "user-1"))
        .await
        .unwrap();

    assert!(record.is_complete());
    assert_eq!(record.checksum, expected_checksum);
    assert_eq!(record.variants.len(), 4);

    // Original plus four variants in every tier.
    assert_eq!(harness.durable.object_count(), 5);
    assert_eq!(harness.object.object_count(), 5);
    assert_eq!(edge.object_count(), 5);
    for variant in std::iter::once(&record.original).chain(record.variants.values()) {
        assert!(variant.local_location().is_some());
        assert!(variant.object_location().is_some());
        assert!(variant.edge_location().is_some());
    }
    assert!(edge.contains(&format!("{}/original.bin", record.id)));
    assert!(edge.contains(&format!("{}/medium.bin", record.id)));

    let fetched = pipeline.get_record(record.id).await.unwrap();
    assert_eq!(fetched.id, record.id);
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_invalid_artifact_fails_before_any_write() {
    let harness = Harness::new();
    let pipeline = harness.pipeline_with_edge(edge_backend());

    let err = pipeline
        .process(ArtifactRequest::new(
            vec![0u8; 64],
            "image/png",
            "user-1",
        ))
        .await
        .unwrap_err();

    assert_eq!(err.step, PipelineStep::DimensionProbe);
    assert!(matches!(err.cause(), PipelineError::InvalidArtifact(_)));
    assert!(err.compensation.is_empty());
    assert_eq!(harness.durable.object_count(), 0);
}

#[tokio::test]
async fn test_permanent_edge_failure_unwinds_earlier_tiers() {
    let harness = Harness::new();
    let edge = Arc::new(FailingBackend::permanent(BackendKind::Edge));
    let pipeline = harness.pipeline_with_edge(edge.clone());

    let err = pipeline.process(request()).await.unwrap_err();

    assert_eq!(err.step, PipelineStep::EdgePublish);
    assert!(matches!(
        err.cause(),
        PipelineError::Backend(BackendError::Permanent { .. })
    ));
    // Permanent errors are never retried.
    assert_eq!(edge.write_attempts(), 1);
    assert!(err.compensation.is_empty());

    // Both committed tiers were fully unwound and no record exists.
    assert_eq!(harness.durable.object_count(), 0);
    assert_eq!(harness.object.object_count(), 0);
    assert_eq!(harness.metadata.record_count(), 0);
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_transient_edge_failure_exhausts_retries_then_unwinds() {
    let harness = Harness::new();
    let edge = Arc::new(FailingBackend::transient(BackendKind::Edge));
    let pipeline = harness.pipeline_with_edge(edge.clone());

    let err = pipeline.process(request()).await.unwrap_err();

    assert_eq!(err.step, PipelineStep::EdgePublish);
    assert!(matches!(
        err.cause(),
        PipelineError::Backend(BackendError::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(edge.write_attempts(), 3);
    assert_eq!(harness.durable.object_count(), 0);
    assert_eq!(harness.object.object_count(), 0);
}

#[tokio::test]
async fn test_mid_tier_failure_compensates_partial_writes() {
    let harness = Harness::new();
    // Accepts the original and the tiny variant, then cuts off.
    let object = Arc::new(FailAfterBackend::new(BackendKind::Object, 2));
    let pipeline = harness.pipeline(
        harness.durable.clone(),
        object.clone(),
        edge_backend(),
        None,
    );

    let err = pipeline.process(request()).await.unwrap_err();

    assert_eq!(err.step, PipelineStep::ObjectStoreWrite);
    assert!(err.compensation.is_empty());

    // The two committed object keys and all five durable keys are gone.
    assert_eq!(object.delete_attempts(), 2);
    assert_eq!(object.inner().object_count(), 0);
    assert_eq!(harness.durable.object_count(), 0);
    assert_eq!(harness.metadata.record_count(), 0);
}

#[tokio::test]
async fn test_compensation_failures_never_mask_the_cause() {
    let harness = Harness::new();
    let durable = Arc::new(
        FailAfterBackend::new(BackendKind::Durable, usize::MAX).with_failing_deletes(),
    );
    let object = Arc::new(FailingBackend::permanent(BackendKind::Object));
    let pipeline = harness.pipeline(durable.clone(), object, edge_backend(), None);

    let err = pipeline.process(request()).await.unwrap_err();

    // The reported failure is the object write, not the failed deletes.
    assert_eq!(err.step, PipelineStep::ObjectStoreWrite);
    assert!(matches!(
        err.cause(),
        PipelineError::Backend(BackendError::Permanent { .. })
    ));

    // All five durable deletes were attempted and reported.
    assert_eq!(err.compensation.len(), 5);
    assert_eq!(durable.delete_attempts(), 5);
    for failure in &err.compensation {
        assert_eq!(failure.step, PipelineStep::DurableWrite);
    }
}

#[tokio::test]
async fn test_metadata_failure_unwinds_all_three_tiers() {
    let harness = Harness::new();
    let edge = edge_backend();
    let metadata: Arc<dyn MetadataStore> = Arc::new(FailingMetadataStore::new());
    let pipeline = PipelineOrchestrator::builder()
        .with_durable(harness.durable.clone())
        .with_object(harness.object.clone())
        .with_edge(edge.clone())
        .with_metadata(metadata)
        .with_transformer(Arc::new(SubsampleTransformer::new()))
        .with_config(harness.config())
        .build()
        .unwrap();

    let err = pipeline.process(request()).await.unwrap_err();

    assert_eq!(err.step, PipelineStep::MetadataSave);
    assert!(matches!(err.cause(), PipelineError::Metadata(_)));
    assert_eq!(harness.durable.object_count(), 0);
    assert_eq!(harness.object.object_count(), 0);
    assert_eq!(edge.object_count(), 0);
}

#[tokio::test]
async fn test_optimization_failure_degrades_instead_of_failing() {
    let harness = Harness::new();
    let optimizer: Arc<dyn VariantOptimizer> = Arc::new(FailingOptimizer::for_kind(
        VariantKind::Derived(SizeClass::Medium),
    ));
    let pipeline = harness.pipeline(
        harness.durable.clone(),
        harness.object.clone(),
        edge_backend(),
        Some(optimizer),
    );

    let record = pipeline.process(request()).await.unwrap();

    assert!(record.original.optimized);
    assert!(!record.variants[&SizeClass::Medium].optimized);
    assert!(record.variants[&SizeClass::Tiny].optimized);
    assert!(record.variants[&SizeClass::Large].optimized);
    assert_eq!(harness.durable.object_count(), 5);
}

#[tokio::test]
async fn test_pre_cancelled_run_touches_nothing() {
    let harness = Harness::new();
    let pipeline = harness.pipeline_with_edge(edge_backend());

    let token = CancellationToken::new();
    token.cancel("caller gave up");
    let err = pipeline
        .process_with_cancel(request(), &token)
        .await
        .unwrap_err();

    assert!(matches!(err.cause(), PipelineError::Cancelled(reason) if reason == "caller gave up"));
    assert!(err.compensation.is_empty());
    assert_eq!(harness.durable.object_count(), 0);
    assert_eq!(harness.metadata.record_count(), 0);
}

#[tokio::test]
async fn test_mid_run_cancellation_unwinds_committed_writes() {
    let harness = Harness::new();
    let token = Arc::new(CancellationToken::new());
    // Trips after the durable tier commits its second write.
    let durable = Arc::new(TripwireBackend::new(
        BackendKind::Durable,
        token.clone(),
        2,
    ));
    let pipeline = harness.pipeline(
        durable.clone(),
        harness.object.clone(),
        edge_backend(),
        None,
    );

    let err = pipeline
        .process_with_cancel(request(), &token)
        .await
        .unwrap_err();

    assert_eq!(err.step, PipelineStep::DurableWrite);
    assert!(matches!(err.cause(), PipelineError::Cancelled(_)));

    // The two committed durable writes were deleted; nothing reached the
    // later tiers.
    assert_eq!(durable.inner().object_count(), 0);
    assert_eq!(harness.object.object_count(), 0);
    assert_eq!(harness.metadata.record_count(), 0);
    assert!(harness.staging_is_empty());
}

#[tokio::test]
async fn test_delete_record_removes_every_tier_and_the_record() {
    let harness = Harness::new();
    let edge = edge_backend();
    let pipeline = harness.pipeline_with_edge(edge.clone());

    let record = pipeline.process(request()).await.unwrap();
    assert_eq!(harness.durable.object_count(), 5);

    pipeline.delete_record(record.id).await.unwrap();

    assert_eq!(harness.durable.object_count(), 0);
    assert_eq!(harness.object.object_count(), 0);
    assert_eq!(edge.object_count(), 0);
    assert!(pipeline.get_record(record.id).await.is_err());
}

#[tokio::test]
async fn test_delete_record_unknown_id() {
    let harness = Harness::new();
    let pipeline = harness.pipeline_with_edge(edge_backend());

    let missing = Uuid::new_v4();
    assert!(matches!(
        pipeline.delete_record(missing).await,
        Err(RemovalError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_delete_record_reports_partial_failures() {
    let harness = Harness::new();
    let edge = edge_backend();
    let durable = Arc::new(
        FailAfterBackend::new(BackendKind::Durable, usize::MAX).with_failing_deletes(),
    );
    let pipeline = harness.pipeline(durable, harness.object.clone(), edge.clone(), None);

    let record = pipeline.process(request()).await.unwrap();
    let err = pipeline.delete_record(record.id).await.unwrap_err();

    let RemovalError::Incomplete { id, errors } = err else {
        panic!("expected incomplete removal");
    };
    assert_eq!(id, record.id);
    assert_eq!(errors.len(), 5);

    // The reachable tiers were still cleaned and the record is gone.
    assert_eq!(harness.object.object_count(), 0);
    assert_eq!(edge.object_count(), 0);
    assert!(pipeline.get_record(record.id).await.is_err());
}

#[tokio::test]
async fn test_concurrent_runs_do_not_interfere() {
    let harness = Harness::new();
    let edge = edge_backend();
    let pipeline = Arc::new(harness.pipeline_with_edge(edge.clone()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .process(ArtifactRequest::new(
                    synthetic_png(1600, 900, 4096),
                    "image/png",
                    format!("user-{i}"),
                ))
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        let record = handle.await.unwrap().unwrap();
        ids.push(record.id);
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 4);
    assert_eq!(harness.durable.object_count(), 20);
    assert_eq!(harness.metadata.record_count(), 4);
}

#[tokio::test]
async fn test_builder_rejects_missing_and_mismatched_components() {
    let err = PipelineOrchestrator::builder().build().unwrap_err();
    assert!(err.to_string().contains("durable"));

    // An object-tier backend wired into the durable slot is refused.
    let err = PipelineOrchestrator::builder()
        .with_durable(Arc::new(InMemoryBackend::new(
            BackendKind::Object,
            "mem://object",
        )))
        .with_object(Arc::new(InMemoryBackend::new(
            BackendKind::Object,
            "mem://object",
        )))
        .with_edge(edge_backend())
        .with_metadata(Arc::new(InMemoryMetadataStore::new()))
        .with_transformer(Arc::new(SubsampleTransformer::new()))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("durable-store"));
}
