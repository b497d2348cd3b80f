//! Run phases and the committed-step log driving compensation.

use std::fmt;

use crate::errors::PipelineStep;

/// Where a run currently stands.
///
/// Transitions are strictly sequential on the forward pass; any failure
/// moves to `Compensating` with the failing step and terminates in
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Request accepted, nothing executed yet.
    Validated,
    /// Source dimensions extracted.
    DimensionsExtracted,
    /// All derivatives generated.
    DerivativesGenerated,
    /// Optimization pass finished (possibly degraded).
    Optimized,
    /// Original and variants in the durable store.
    DurablyStored,
    /// Original and variants in the object store.
    ObjectStored,
    /// Original and variants published to the edge.
    Published,
    /// Record persisted; terminal success.
    MetadataSaved,
    /// Unwinding after a failure at the given step.
    Compensating(PipelineStep),
    /// Terminal failure.
    Failed,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validated => f.write_str("validated"),
            Self::DimensionsExtracted => f.write_str("dimensions-extracted"),
            Self::DerivativesGenerated => f.write_str("derivatives-generated"),
            Self::Optimized => f.write_str("optimized"),
            Self::DurablyStored => f.write_str("durably-stored"),
            Self::ObjectStored => f.write_str("object-stored"),
            Self::Published => f.write_str("published"),
            Self::MetadataSaved => f.write_str("metadata-saved"),
            Self::Compensating(step) => write!(f, "compensating-from-{step}"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// One committed step and the keys it wrote.
#[derive(Debug, Clone)]
pub struct CommittedStep {
    /// The step that committed.
    pub step: PipelineStep,
    /// Keys written during the step, in write order.
    pub keys: Vec<String>,
}

/// Ordered log of committed steps for one run.
///
/// Grows monotonically during the forward pass and is consumed exactly
/// once, in strict reverse order, during compensation. The orchestrator
/// is single-threaded with respect to these transitions, so no locking is
/// needed.
#[derive(Debug, Default)]
pub struct PipelineState {
    log: Vec<CommittedStep>,
}

impl PipelineState {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed step. A step that failed partway through is
    /// committed with the keys it managed to write, so compensation
    /// covers them.
    pub fn commit(&mut self, step: PipelineStep, keys: Vec<String>) {
        self.log.push(CommittedStep { step, keys });
    }

    /// The committed steps in forward order.
    #[must_use]
    pub fn committed(&self) -> &[CommittedStep] {
        &self.log
    }

    /// The most recently committed step.
    #[must_use]
    pub fn last_committed(&self) -> Option<PipelineStep> {
        self.log.last().map(|entry| entry.step)
    }

    /// Consumes the log in strict reverse order.
    pub fn into_reverse(self) -> impl Iterator<Item = CommittedStep> {
        self.log.into_iter().rev()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_grows_in_order() {
        let mut state = PipelineState::new();
        state.commit(PipelineStep::DurableWrite, vec!["a".into()]);
        state.commit(PipelineStep::ObjectStoreWrite, vec!["b".into()]);

        assert_eq!(state.committed().len(), 2);
        assert_eq!(state.last_committed(), Some(PipelineStep::ObjectStoreWrite));
    }

    #[test]
    fn test_reverse_consumption() {
        let mut state = PipelineState::new();
        state.commit(PipelineStep::DurableWrite, vec!["a".into()]);
        state.commit(PipelineStep::ObjectStoreWrite, vec!["b".into()]);
        state.commit(PipelineStep::EdgePublish, vec!["c".into()]);

        let steps: Vec<_> = state.into_reverse().map(|entry| entry.step).collect();
        assert_eq!(
            steps,
            vec![
                PipelineStep::EdgePublish,
                PipelineStep::ObjectStoreWrite,
                PipelineStep::DurableWrite,
            ]
        );
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(PipelinePhase::Published.to_string(), "published");
        assert_eq!(
            PipelinePhase::Compensating(PipelineStep::EdgePublish).to_string(),
            "compensating-from-edge-publish"
        );
    }
}
