use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::WorkflowContext;
use crate::error::StepError;
use crate::id::StepId;

/// A unit of work that can be executed and compensated.
///
/// Steps run strictly in order within a workflow. When a later step fails,
/// every step that completed is compensated in reverse order, at most once
/// per run.
///
/// Implementations must be shareable across tasks: composite steps run
/// their children concurrently.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable identity used for compensation bookkeeping.
    fn id(&self) -> StepId;

    /// Human-readable name for logging and error messages.
    fn name(&self) -> &str;

    /// Perform the step.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails to complete. Implementations should
    /// return [`StepError::Cancelled`] when `cancel` fires mid-way.
    async fn execute(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError>;

    /// Undo the step's effects.
    ///
    /// Called during rollback when a later step fails. The default
    /// implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns an error if compensation fails.
    async fn compensate(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let _ = (ctx, cancel);
        Ok(())
    }

    /// Release resources held by the step. Must be idempotent.
    fn dispose(&self) {}

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}

#[async_trait]
impl<S> Step for Box<S>
where
    S: Step + ?Sized,
{
    fn id(&self) -> StepId {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        (**self).execute(ctx, cancel).await
    }

    async fn compensate(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        (**self).compensate(ctx, cancel).await
    }

    fn dispose(&self) {
        (**self).dispose();
    }

    fn compensation_description(&self) -> String {
        (**self).compensation_description()
    }
}

/// One-shot guard for idempotent disposal.
#[derive(Debug, Default)]
pub struct DisposeFlag(AtomicBool);

impl DisposeFlag {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Returns `true` for the first caller only.
    pub fn try_dispose(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
