use async_trait::async_trait;
use flowforge_engine::{Middleware, Next, Step, StepError, WorkflowContext};
use tracing::error;

/// Logs step failures and rewraps them as [`StepError::Translated`].
///
/// Cancellation passes through untouched so callers can still recognise it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorHandlingMiddleware;

#[async_trait]
impl Middleware for ErrorHandlingMiddleware {
    fn name(&self) -> &str {
        "error-handling"
    }

    async fn invoke(
        &self,
        step: &dyn Step,
        ctx: &WorkflowContext,
        next: Next<'_>,
    ) -> Result<(), StepError> {
        next.run().await.map_err(|source| {
            if source.is_cancelled() {
                return source;
            }
            error!(
                step = %step.name(),
                workflow = %ctx.workflow().name,
                correlation_id = %ctx.correlation_id(),
                error = %source,
                "error executing step"
            );
            StepError::Translated {
                step: step.name().to_string(),
                source: Box::new(source),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use flowforge_engine::ActionStep;

    use super::*;
    use crate::test_support::{pipeline, run};

    #[tokio::test]
    async fn wraps_failures_with_step_name() {
        let pipeline = pipeline(ErrorHandlingMiddleware);
        let step = ActionStep::new("charge", |_, _| async {
            Err(StepError::msg("card declined"))
        });

        let err = run(&pipeline, &step).await.expect_err("step fails");

        assert_eq!(err.to_string(), "step 'charge' failed");
        let source = err.source().expect("original failure kept");
        assert_eq!(source.to_string(), "card declined");
    }

    #[tokio::test]
    async fn leaves_cancellation_alone() {
        let pipeline = pipeline(ErrorHandlingMiddleware);
        let step = ActionStep::new("cancelled", |_, _| async { Err(StepError::Cancelled) });

        let err = run(&pipeline, &step).await.expect_err("step fails");

        assert!(matches!(err, StepError::Cancelled));
    }

    #[tokio::test]
    async fn leaves_wrapped_cancellation_alone() {
        let pipeline = pipeline(ErrorHandlingMiddleware);
        let step = ActionStep::new("gave-up", |_, _| async {
            Err(StepError::RetriesExhausted {
                step: "gave-up".to_string(),
                attempts: 2,
                last: Box::new(StepError::Cancelled),
            })
        });

        let err = run(&pipeline, &step).await.expect_err("step fails");

        assert!(matches!(err, StepError::RetriesExhausted { .. }));
    }

    #[tokio::test]
    async fn success_is_untouched() {
        let pipeline = pipeline(ErrorHandlingMiddleware);
        let step = ActionStep::new("ok", |_, _| async { Ok(()) });

        assert!(run(&pipeline, &step).await.is_ok());
    }
}
