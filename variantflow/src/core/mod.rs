//! Core data model: requests, dimensions, variants, and persisted records.

mod dimensions;
mod record;
mod request;
mod variant;

pub use dimensions::{probe_dimensions, Dimensions, ProbeError};
pub use record::ArtifactRecord;
pub use request::ArtifactRequest;
pub use variant::{LocationOrderError, SizeClass, Variant, VariantKind};
