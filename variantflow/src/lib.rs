//! # Variantflow
//!
//! A multi-backend artifact processing pipeline. An uploaded artifact is
//! probed for dimensions, fanned out into size-class derivatives, run
//! through a best-effort optimization pass, written through three storage
//! tiers in strict order (durable store, object store, edge publisher),
//! and finally described by a metadata record. Any step failure unwinds
//! every committed write in reverse order, so an artifact is observable
//! either everywhere or nowhere.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use variantflow::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = PipelineOrchestrator::builder()
//!     .with_durable(Arc::new(LocalDiskStore::new("/var/lib/variantflow")))
//!     .with_object(Arc::new(InMemoryBackend::new(BackendKind::Object, "mem://object")))
//!     .with_edge(Arc::new(InMemoryBackend::new(BackendKind::Edge, "https://cdn.example")))
//!     .with_metadata(Arc::new(InMemoryMetadataStore::new()))
//!     .with_transformer(Arc::new(SubsampleTransformer::new()))
//!     .build()?;
//!
//! let request = ArtifactRequest::new(std::fs::read("photo.png")?, "image/png", "user-1");
//! let record = pipeline.process(request).await?;
//! println!("stored {} variants", record.variants.len());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod derivative;
pub mod errors;
pub mod metadata;
pub mod observability;
pub mod pipeline;
pub mod retry;
pub mod storage;
pub mod testing;
pub mod utils;

/// Convenience re-exports of the types most callers need.
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        ArtifactRecord, ArtifactRequest, Dimensions, SizeClass, Variant, VariantKind,
    };
    pub use crate::derivative::{SubsampleTransformer, VariantTransformer};
    pub use crate::errors::{PipelineError, PipelineStep, ProcessError, RemovalError};
    pub use crate::metadata::{InMemoryMetadataStore, MetadataStore};
    pub use crate::pipeline::{
        NoopOptimizer, PipelineBuilder, PipelineOrchestrator, VariantOptimizer,
    };
    pub use crate::retry::{RetryConfig, RetryPolicy};
    pub use crate::storage::{
        BackendKind, InMemoryBackend, LocalDiskStore, Location, StorageBackend,
    };
}
