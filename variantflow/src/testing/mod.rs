//! Test doubles and fixtures.
//!
//! Deterministic fault-injecting collaborators for exercising retry,
//! compensation, and cancellation paths. Public so downstream crates can
//! reuse them in their own tests.

mod fixtures;
mod mocks;

pub use fixtures::synthetic_png;
pub use mocks::{
    FailAfterBackend, FailingBackend, FailingMetadataStore, FailingOptimizer,
    FailingTransformer, FlakyBackend, TripwireBackend,
};
