//! Error taxonomy for the processing pipeline.
//!
//! Each failure case is a distinct variant carrying structured fields;
//! dispatch is by variant tag. Compensation failures are reported alongside
//! the triggering error and never replace it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::core::SizeClass;
use crate::derivative::TransformError;
use crate::retry::ErrorClass;
use crate::storage::BackendKind;

/// The steps of the forward pass, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStep {
    /// Extracting source dimensions from the payload.
    DimensionProbe,
    /// Parallel derivative generation.
    DerivativeGeneration,
    /// Best-effort per-variant optimization.
    Optimization,
    /// Writing through the durable local store.
    DurableWrite,
    /// Writing through the remote object store.
    ObjectStoreWrite,
    /// Publishing through the edge distribution layer.
    EdgePublish,
    /// Persisting the metadata record.
    MetadataSave,
}

impl PipelineStep {
    /// Stable kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DimensionProbe => "dimension-probe",
            Self::DerivativeGeneration => "derivative-generation",
            Self::Optimization => "optimization",
            Self::DurableWrite => "durable-write",
            Self::ObjectStoreWrite => "object-store-write",
            Self::EdgePublish => "edge-publish",
            Self::MetadataSave => "metadata-save",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend was supplied for a tier it does not serve.
#[derive(Debug, Clone, Copy, Error)]
#[error("expected a {expected} backend, got {actual}")]
pub struct BackendKindMismatch {
    /// The tier being wired.
    pub expected: BackendKind,
    /// The tier the supplied backend actually serves.
    pub actual: BackendKind,
}

/// A failure from one storage backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transient condition (network blip, throttling); retryable.
    #[error("transient backend failure: {message}")]
    Transient {
        /// Human-readable cause.
        message: String,
    },

    /// Permanent condition (malformed input, auth); never retried.
    #[error("permanent backend failure: {message}")]
    Permanent {
        /// Human-readable cause.
        message: String,
    },

    /// The backend's retry budget ran out.
    #[error("{source} (gave up after {attempts} attempts)")]
    Exhausted {
        /// Attempts made, including the initial one.
        attempts: usize,
        /// The error from the final attempt.
        #[source]
        source: Box<BackendError>,
    },
}

impl BackendError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a permanent error.
    #[must_use]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Default classification of this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transient { .. } => ErrorClass::Transient,
            Self::Permanent { .. } | Self::Exhausted { .. } => ErrorClass::Fatal,
        }
    }
}

/// Parallel derivative generation failed for one or more size classes.
///
/// The generator has already removed any partial output of its own by the
/// time this error is returned, so there is nothing for the orchestrator
/// to compensate.
#[derive(Debug, Error)]
#[error(
    "derivative generation failed for [{}]: {source}",
    .failed.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
)]
pub struct DerivativeError {
    /// The size classes whose generation tasks failed.
    pub failed: Vec<SizeClass>,
    /// The first underlying cause.
    #[source]
    pub source: TransformError,
}

/// A failure from the metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No record exists under the given identifier.
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// The store itself failed.
    #[error("metadata store failure: {message}")]
    Store {
        /// Human-readable cause.
        message: String,
    },
}

impl MetadataError {
    /// Creates a store failure.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }
}

/// The cause of a failed pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The payload could not be interpreted; never retried.
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),

    /// A storage backend failed after its own retries.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Derivative generation failed (self-compensating).
    #[error(transparent)]
    Derivative(#[from] DerivativeError),

    /// The metadata store failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The run was cancelled by the caller.
    #[error("pipeline cancelled: {0}")]
    Cancelled(String),

    /// An internal invariant was violated.
    #[error("internal pipeline error: {0}")]
    Internal(String),
}

/// One failed compensating action.
///
/// Compensation failures are collected and reported; they are never fatal
/// to the overall error path and never mask the triggering error.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("compensation failed at {step} for key '{key}': {message}")]
pub struct CompensationError {
    /// The committed step being unwound.
    pub step: PipelineStep,
    /// The key whose delete failed.
    pub key: String,
    /// Human-readable cause.
    pub message: String,
}

/// A pipeline run failed and has been unwound.
///
/// `source` is always the original triggering error; `compensation` lists
/// the (possibly empty) failures encountered while unwinding.
#[derive(Debug, Error)]
#[error("pipeline failed at {step}: {source}")]
pub struct ProcessError {
    /// The step whose failure triggered compensation.
    pub step: PipelineStep,
    /// The triggering error.
    #[source]
    pub source: PipelineError,
    /// Compensation failures encountered while unwinding.
    pub compensation: Vec<CompensationError>,
}

impl ProcessError {
    /// The triggering error.
    #[must_use]
    pub fn cause(&self) -> &PipelineError {
        &self.source
    }
}

/// Best-effort record removal did not fully succeed.
#[derive(Debug, Error)]
pub enum RemovalError {
    /// No record exists under the given identifier.
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// Removal ran to completion but some sub-deletes failed.
    #[error("removal of {id} completed with {} error(s)", .errors.len())]
    Incomplete {
        /// The record identifier.
        id: Uuid,
        /// The sub-delete failures, none of which masked the others.
        errors: Vec<CompensationError>,
    },
}
