use dashmap::DashSet;

use crate::id::{RunId, StepId};

/// Remembers which steps have already been compensated, per run.
///
/// Marking is a single atomic insert, so concurrent callers racing to
/// compensate the same step see exactly one winner.
#[derive(Debug, Default)]
pub struct CompensationTracker {
    compensated: DashSet<(RunId, StepId)>,
}

impl CompensationTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `step` was compensated during `run`.
    ///
    /// Returns `false` if it was already recorded.
    pub fn mark_compensated(&self, run: RunId, step: StepId) -> bool {
        self.compensated.insert((run, step))
    }

    #[must_use]
    pub fn is_compensated(&self, run: RunId, step: StepId) -> bool {
        self.compensated.contains(&(run, step))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.compensated.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compensated.is_empty()
    }
}
