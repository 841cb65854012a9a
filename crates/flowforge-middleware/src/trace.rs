use async_trait::async_trait;
use flowforge_engine::{Middleware, Next, Step, StepError, WorkflowContext};
use tracing::{Instrument, info_span};

/// Runs each step inside an `execute_step` span carrying the correlation,
/// workflow and step identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

#[async_trait]
impl Middleware for TracingMiddleware {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn invoke(
        &self,
        step: &dyn Step,
        ctx: &WorkflowContext,
        next: Next<'_>,
    ) -> Result<(), StepError> {
        let span = info_span!(
            "execute_step",
            correlation_id = %ctx.correlation_id(),
            workflow_id = %ctx.workflow().id,
            workflow_name = %ctx.workflow().name,
            step_id = %step.id(),
            step_name = %step.name(),
        );
        next.run().instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use flowforge_engine::ActionStep;

    use super::*;
    use crate::test_support::{pipeline, run};

    #[tokio::test]
    async fn result_is_unchanged() {
        let pipeline = pipeline(TracingMiddleware);
        let ok = ActionStep::new("ok", |_, _| async { Ok(()) });
        let broken = ActionStep::new("broken", |_, _| async { Err(StepError::msg("boom")) });

        assert!(run(&pipeline, &ok).await.is_ok());
        assert!(matches!(
            run(&pipeline, &broken).await,
            Err(StepError::Failed { .. })
        ));
    }
}
