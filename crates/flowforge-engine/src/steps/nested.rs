use std::fmt;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info_span};

use crate::context::WorkflowContext;
use crate::engine::Engine;
use crate::error::StepError;
use crate::id::StepId;
use crate::step::{DisposeFlag, Step};
use crate::workflow::Workflow;

/// Runs a whole workflow as a single step of its parent.
///
/// The inner workflow shares the parent's context. When `engine` is the
/// one running the parent it reuses the parent's execution slot, otherwise
/// it waits for a slot of `engine`. Every execution is a separate run, so a
/// retried nested workflow undoes each attempt's work. Its own failure
/// handling (including automatic compensation) happens inside the inner
/// run; compensating this step from the parent is a no-op.
pub struct NestedWorkflowStep {
    id: StepId,
    workflow: Workflow,
    engine: Engine,
    disposed: DisposeFlag,
}

impl NestedWorkflowStep {
    #[must_use]
    pub fn new(workflow: Workflow, engine: Engine) -> Self {
        Self {
            id: StepId::new(),
            workflow,
            engine,
            disposed: DisposeFlag::new(),
        }
    }

    #[must_use]
    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }
}

#[async_trait]
impl Step for NestedWorkflowStep {
    fn id(&self) -> StepId {
        self.id
    }

    fn name(&self) -> &str {
        self.workflow.name()
    }

    async fn execute(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let span = info_span!(
            "nested_workflow",
            parent_workflow_id = %ctx.workflow().id,
            parent_workflow_name = %ctx.workflow().name,
            nested_workflow_id = %self.workflow.id(),
        );
        self.engine
            .execute_nested(&self.workflow, ctx, cancel)
            .instrument(span)
            .await
            .map_err(|source| StepError::Nested {
                workflow: self.workflow.name().to_string(),
                source: Box::new(source),
            })
    }

    fn dispose(&self) {
        if self.disposed.try_dispose() {
            self.workflow.dispose();
        }
    }

    fn compensation_description(&self) -> String {
        format!("nothing to undo for {}; handled by the inner run", self.name())
    }
}

impl fmt::Debug for NestedWorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedWorkflowStep")
            .field("id", &self.id)
            .field("workflow", &self.workflow)
            .finish_non_exhaustive()
    }
}
