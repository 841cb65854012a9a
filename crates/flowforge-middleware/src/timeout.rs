use std::time::Duration;

use async_trait::async_trait;
use flowforge_engine::{Middleware, Next, Step, StepError, WorkflowContext};
use tracing::warn;

/// Fails a step that runs longer than `timeout`.
///
/// The inner chain runs under a child of the run's cancellation token. When
/// the limit is hit that child is cancelled, so work the step handed off
/// elsewhere sees the cancellation too, and the step fails with
/// [`StepError::Timeout`].
#[derive(Debug, Clone, Copy)]
pub struct TimeoutMiddleware {
    timeout: Duration,
}

impl TimeoutMiddleware {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Middleware for TimeoutMiddleware {
    fn name(&self) -> &str {
        "timeout"
    }

    async fn invoke(
        &self,
        step: &dyn Step,
        _ctx: &WorkflowContext,
        next: Next<'_>,
    ) -> Result<(), StepError> {
        let deadline = next.cancel().child_token();
        let guarded = next.with_cancel(&deadline);

        if let Ok(result) = tokio::time::timeout(self.timeout, guarded.run()).await {
            result
        } else {
            deadline.cancel();
            warn!(step = %step.name(), timeout = ?self.timeout, "step timed out");
            Err(StepError::Timeout {
                step: step.name().to_string(),
                timeout: self.timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use flowforge_engine::ActionStep;

    use super::*;
    use crate::test_support::{pipeline, run};

    #[tokio::test(start_paused = true)]
    async fn slow_step_times_out() {
        let pipeline = pipeline(TimeoutMiddleware::new(Duration::from_millis(50)));
        let step = ActionStep::new("slow", |_, _| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        });

        let err = run(&pipeline, &step).await.expect_err("times out");

        match err {
            StepError::Timeout { step, timeout } => {
                assert_eq!(step, "slow");
                assert_eq!(timeout, Duration::from_millis(50));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fast_step_completes() {
        let pipeline = pipeline(TimeoutMiddleware::new(Duration::from_secs(1)));
        let step = ActionStep::new("fast", |_, _| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(())
        });

        assert!(run(&pipeline, &step).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_token_seen_by_step() {
        let observed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&observed);
        let pipeline = pipeline(TimeoutMiddleware::new(Duration::from_millis(20)));
        let step = ActionStep::new("hands-off", move |_, cancel| {
            let flag = Arc::clone(&flag);
            async move {
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    flag.store(true, Ordering::SeqCst);
                });
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            }
        });

        let result = run(&pipeline, &step).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(matches!(result, Err(StepError::Timeout { .. })));
        assert!(observed.load(Ordering::SeqCst));
    }
}
