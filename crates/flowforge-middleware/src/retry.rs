use std::time::Duration;

use async_trait::async_trait;
use flowforge_engine::{ConfigError, Middleware, Next, Step, StepError, WorkflowContext};
use flowforge_retry::{FixedInterval, Retry, RetryError};
use tracing::{Instrument, debug, info_span};

/// Re-runs the rest of the chain until it succeeds or `max_attempts` is reached.
///
/// Waits a fixed `delay` between attempts. Unlike
/// [`RetryStep`](flowforge_engine::RetryStep) this applies to every step the
/// engine runs.
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    max_attempts: u32,
    strategy: FixedInterval,
}

impl RetryMiddleware {
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `max_attempts` is zero.
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max-attempts",
                value: 0,
                min: 1,
                max: i64::from(u32::MAX),
            });
        }
        Ok(Self {
            max_attempts,
            strategy: FixedInterval::new(delay, max_attempts),
        })
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    fn name(&self) -> &str {
        "retry"
    }

    async fn invoke(
        &self,
        step: &dyn Step,
        _ctx: &WorkflowContext,
        next: Next<'_>,
    ) -> Result<(), StepError> {
        let span = info_span!("retry", step_name = %step.name(), max_attempts = self.max_attempts);
        let outcome = Retry::new(&self.strategy)
            .max_attempts(self.max_attempts)
            .run(next.cancel(), |attempt| {
                debug!(attempt, "running step");
                next.run()
            })
            .instrument(span)
            .await;

        match outcome {
            Ok(()) => Ok(()),
            Err(RetryError::Exhausted { attempts, last }) if !last.is_cancelled() => {
                Err(StepError::RetriesExhausted {
                    step: step.name().to_string(),
                    attempts,
                    last: Box::new(last),
                })
            }
            Err(other) => Err(other.into_last().unwrap_or(StepError::Cancelled)),
        }
    }
}
