//! The validated upload handed to the pipeline.

use std::sync::Arc;

/// An already-validated upload request.
///
/// Constructed by the validation layer, consumed exactly once by the
/// orchestrator, and never retained. The payload is shared behind an `Arc`
/// so the parallel generation tasks can borrow it without copying.
#[derive(Debug, Clone)]
pub struct ArtifactRequest {
    /// Raw artifact payload.
    pub bytes: Arc<Vec<u8>>,
    /// Declared media type (e.g. `image/png`).
    pub content_type: String,
    /// Identifier of the uploading user.
    pub uploaded_by: String,
    /// Free-form tags supplied with the upload.
    pub tags: Vec<String>,
}

impl ArtifactRequest {
    /// Creates a new request.
    #[must_use]
    pub fn new(
        bytes: Vec<u8>,
        content_type: impl Into<String>,
        uploaded_by: impl Into<String>,
    ) -> Self {
        Self {
            bytes: Arc::new(bytes),
            content_type: content_type.into(),
            uploaded_by: uploaded_by.into(),
            tags: Vec::new(),
        }
    }

    /// Attaches tags to the request.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_construction() {
        let request = ArtifactRequest::new(vec![1, 2, 3], "image/png", "user-1")
            .with_tags(vec!["avatar".to_string()]);

        assert_eq!(request.byte_len(), 3);
        assert_eq!(request.content_type, "image/png");
        assert_eq!(request.uploaded_by, "user-1");
        assert_eq!(request.tags, vec!["avatar".to_string()]);
    }

    #[test]
    fn test_payload_is_shared_not_copied() {
        let request = ArtifactRequest::new(vec![0u8; 1024], "image/png", "user-1");
        let clone = request.clone();
        assert!(Arc::ptr_eq(&request.bytes, &clone.bytes));
    }
}
