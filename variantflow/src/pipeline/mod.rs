//! The orchestrator coordinating probe, generation, optimization, the
//! three storage tiers, and metadata, with reverse-order compensation on
//! failure.

mod optimizer;
mod orchestrator;
mod state;

pub use optimizer::{NoopOptimizer, OptimizeError, VariantOptimizer};
pub use orchestrator::{BuildError, PipelineBuilder, PipelineOrchestrator};
pub use state::{CommittedStep, PipelinePhase, PipelineState};

#[cfg(test)]
mod integration_tests;
