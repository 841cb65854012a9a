use async_trait::async_trait;
use flowforge_engine::{Middleware, Next, Step, StepError, WorkflowContext};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Logs the start and outcome of every step.
///
/// Start is logged at debug level; completion at info with the elapsed time;
/// failure at warn with the error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    fn name(&self) -> &str {
        "logging"
    }

    async fn invoke(
        &self,
        step: &dyn Step,
        ctx: &WorkflowContext,
        next: Next<'_>,
    ) -> Result<(), StepError> {
        let started = Instant::now();
        debug!(
            step = %step.name(),
            workflow = %ctx.workflow().name,
            "starting step"
        );

        let result = next.run().await;
        let elapsed = started.elapsed();

        match &result {
            Ok(()) => info!(step = %step.name(), elapsed = ?elapsed, "step completed"),
            Err(error) => warn!(
                step = %step.name(),
                elapsed = ?elapsed,
                error = %error,
                "step failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use flowforge_engine::ActionStep;

    use super::*;
    use crate::test_support::{pipeline, run};

    #[tokio::test]
    async fn passes_success_through() {
        let pipeline = pipeline(LoggingMiddleware);
        let step = ActionStep::new("ok", |ctx, _| async move {
            ctx.set("ran", true);
            Ok(())
        });

        assert!(run(&pipeline, &step).await.is_ok());
    }

    #[tokio::test]
    async fn passes_failure_through_unchanged() {
        let pipeline = pipeline(LoggingMiddleware);
        let step = ActionStep::new("broken", |_, _| async { Err(StepError::msg("boom")) });

        let err = run(&pipeline, &step).await.expect_err("step fails");

        assert!(matches!(err, StepError::Failed { ref message } if message == "boom"));
    }
}
