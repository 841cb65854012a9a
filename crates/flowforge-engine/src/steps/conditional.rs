use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::context::WorkflowContext;
use crate::error::StepError;
use crate::id::StepId;
use crate::step::{DisposeFlag, Step};

const UNSELECTED: u8 = 0;
const THEN: u8 = 1;
const ELSE: u8 = 2;

/// Which branch a [`ConditionalStep`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Then,
    Else,
}

type Predicate = Box<dyn Fn(&WorkflowContext) -> bool + Send + Sync>;

/// Runs exactly one of two child steps, chosen by a predicate over the context.
///
/// Compensation only touches the branch that actually ran.
pub struct ConditionalStep {
    id: StepId,
    name: String,
    predicate: Predicate,
    then_step: Box<dyn Step>,
    else_step: Box<dyn Step>,
    selected: AtomicU8,
    disposed: DisposeFlag,
}

impl ConditionalStep {
    pub fn new<P, T, E>(name: impl Into<String>, predicate: P, then_step: T, else_step: E) -> Self
    where
        P: Fn(&WorkflowContext) -> bool + Send + Sync + 'static,
        T: Step + 'static,
        E: Step + 'static,
    {
        Self {
            id: StepId::new(),
            name: name.into(),
            predicate: Box::new(predicate),
            then_step: Box::new(then_step),
            else_step: Box::new(else_step),
            selected: AtomicU8::new(UNSELECTED),
            disposed: DisposeFlag::new(),
        }
    }

    /// The branch chosen by the most recent execution, if any.
    #[must_use]
    pub fn selected_branch(&self) -> Option<Branch> {
        match self.selected.load(Ordering::Acquire) {
            THEN => Some(Branch::Then),
            ELSE => Some(Branch::Else),
            _ => None,
        }
    }

    fn branch(&self, branch: Branch) -> &dyn Step {
        match branch {
            Branch::Then => self.then_step.as_ref(),
            Branch::Else => self.else_step.as_ref(),
        }
    }
}

#[async_trait]
impl Step for ConditionalStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }

        let branch = if (self.predicate)(ctx) {
            Branch::Then
        } else {
            Branch::Else
        };
        let marker = match branch {
            Branch::Then => THEN,
            Branch::Else => ELSE,
        };
        self.selected.store(marker, Ordering::Release);

        let step = self.branch(branch);
        debug!(step = %self.name, ?branch, child = step.name(), "condition evaluated");
        step.execute(ctx, cancel).await
    }

    async fn compensate(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        match self.selected_branch() {
            Some(branch) => self.branch(branch).compensate(ctx, cancel).await,
            None => {
                debug!(step = %self.name, "no branch ran, nothing to compensate");
                Ok(())
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.try_dispose() {
            self.then_step.dispose();
            self.else_step.dispose();
        }
    }

    fn compensation_description(&self) -> String {
        match self.selected_branch() {
            Some(branch) => self.branch(branch).compensation_description(),
            None => format!("undo {}", self.name),
        }
    }
}

impl fmt::Debug for ConditionalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("then", &self.then_step.name())
            .field("else", &self.else_step.name())
            .field("selected", &self.selected_branch())
            .finish_non_exhaustive()
    }
}
