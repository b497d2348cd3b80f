//! The persisted metadata record for a fully processed artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{Dimensions, SizeClass, Variant};

/// Descriptive metadata for one processed artifact.
///
/// Created only at the final successful pipeline step. The record is
/// written whole or not at all: a partially populated record is never
/// observable through the metadata store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Globally unique identifier, assigned at pipeline start.
    pub id: Uuid,
    /// Declared media type from the request.
    pub content_type: String,
    /// Identifier of the uploading user.
    pub uploaded_by: String,
    /// Tags carried over from the request.
    pub tags: Vec<String>,
    /// Source dimensions extracted from the payload.
    pub dimensions: Dimensions,
    /// SHA-256 hex digest of the original payload.
    pub checksum: String,
    /// The stored original.
    pub original: Variant,
    /// One derived variant per size class.
    pub variants: BTreeMap<SizeClass, Variant>,
    /// When the pipeline run started.
    pub created_at: DateTime<Utc>,
    /// When processing completed.
    pub processed_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Returns true if every size class has a variant.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        SizeClass::ALL
            .iter()
            .all(|class| self.variants.contains_key(class))
    }

    /// Total stored bytes across the original and all variants.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.original.byte_len + self.variants.values().map(|v| v.byte_len).sum::<u64>()
    }
}
