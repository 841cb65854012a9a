use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use flowforge_retry::RetryStrategy;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::WorkflowContext;
use crate::error::{ConfigError, StepError};
use crate::id::StepId;
use crate::step::{DisposeFlag, Step};

/// Re-executes a child step on failure.
///
/// Makes at most `max_attempts` attempts. Before every retry the strategy
/// is asked with the zero-based index of the failed attempt; a `false`
/// answer ends the loop early. Either way the final error is
/// [`StepError::RetriesExhausted`] wrapping the last failure.
pub struct RetryStep {
    id: StepId,
    name: String,
    step: Box<dyn Step>,
    max_attempts: u32,
    strategy: Arc<dyn RetryStrategy>,
    disposed: DisposeFlag,
}

impl RetryStep {
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] if `max_attempts` is zero.
    pub fn new<S>(
        step: S,
        max_attempts: u32,
        strategy: Arc<dyn RetryStrategy>,
    ) -> Result<Self, ConfigError>
    where
        S: Step + 'static,
    {
        if max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max-attempts",
                value: 0,
                min: 1,
                max: i64::from(u32::MAX),
            });
        }
        let name = format!("retry({})", step.name());
        Ok(Self {
            id: StepId::new(),
            name,
            step: Box::new(step),
            max_attempts,
            strategy,
            disposed: DisposeFlag::new(),
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn exhausted(&self, attempts: u32, last: StepError) -> StepError {
        StepError::RetriesExhausted {
            step: self.name.clone(),
            attempts,
            last: Box::new(last),
        }
    }
}

#[async_trait]
impl Step for RetryStep {
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
        let mut attempt = 0_u32;

        loop {
            let error = match self.step.execute(ctx, cancel).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => error,
            };

            let attempts = attempt + 1;
            if attempts >= self.max_attempts || !self.strategy.should_retry(attempt) {
                debug!(step = %self.name, attempts, error = %error, "no attempts left");
                return Err(self.exhausted(attempts, error));
            }

            let delay = self.strategy.delay(attempt);
            warn!(
                step = %self.name,
                attempt = attempts,
                max_attempts = self.max_attempts,
                strategy = self.strategy.name(),
                delay = ?delay,
                error = %error,
                "child step failed, retrying"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Err(StepError::Cancelled),
            }
            attempt = attempts;
        }
    }

    async fn compensate(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        self.step.compensate(ctx, cancel).await
    }

    fn dispose(&self) {
        if self.disposed.try_dispose() {
            self.step.dispose();
        }
    }

    fn compensation_description(&self) -> String {
        self.step.compensation_description()
    }
}

impl fmt::Debug for RetryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("strategy", &self.strategy.name())
            .finish_non_exhaustive()
    }
}
