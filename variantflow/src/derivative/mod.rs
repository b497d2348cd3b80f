//! Parallel derivative generation with all-or-nothing semantics.

mod generator;
mod staging;
mod transform;

pub use generator::DerivativeGenerator;
pub use staging::StagingArea;
pub use transform::{SubsampleTransformer, TransformError, VariantTransformer};
