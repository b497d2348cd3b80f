//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::retry::RetryConfig;

/// Configuration for one orchestrator instance.
///
/// Each backend tier carries its own retry tuning; the edge layer is
/// typically the flakiest and gets the widest budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory for per-run staging directories.
    pub staging_root: PathBuf,
    /// Retry tuning for the durable local store.
    pub durable_retry: RetryConfig,
    /// Retry tuning for the remote object store.
    pub object_retry: RetryConfig,
    /// Retry tuning for the edge distribution layer.
    pub edge_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            staging_root: std::env::temp_dir().join("variantflow-staging"),
            durable_retry: RetryConfig::new().with_max_attempts(3).with_base_delay_ms(50),
            object_retry: RetryConfig::new().with_max_attempts(4).with_base_delay_ms(100),
            edge_retry: RetryConfig::new().with_max_attempts(4).with_base_delay_ms(200),
        }
    }
}

impl PipelineConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the staging root.
    #[must_use]
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = root.into();
        self
    }

    /// Sets the durable-store retry tuning.
    #[must_use]
    pub fn with_durable_retry(mut self, retry: RetryConfig) -> Self {
        self.durable_retry = retry;
        self
    }

    /// Sets the object-store retry tuning.
    #[must_use]
    pub fn with_object_retry(mut self, retry: RetryConfig) -> Self {
        self.object_retry = retry;
        self
    }

    /// Sets the edge-publisher retry tuning.
    #[must_use]
    pub fn with_edge_retry(mut self, retry: RetryConfig) -> Self {
        self.edge_retry = retry;
        self
    }

    /// One retry config per tier with the same fast tuning; handy in
    /// tests.
    #[must_use]
    pub fn with_uniform_retry(mut self, retry: RetryConfig) -> Self {
        self.durable_retry = retry.clone();
        self.object_retry = retry.clone();
        self.edge_retry = retry;
        self
    }
}
