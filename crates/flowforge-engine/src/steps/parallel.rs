use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::WorkflowContext;
use crate::error::StepError;
use crate::id::StepId;
use crate::step::{DisposeFlag, Step};

/// Runs child steps concurrently against the same context.
///
/// At most `max_parallelism` children run at once; `0` means unbounded.
/// The step fails if any child fails, after every child has settled.
/// Compensation runs every child's compensation concurrently as well;
/// children that never ran are expected to treat it as a no-op.
pub struct ParallelStep {
    id: StepId,
    name: String,
    max_parallelism: usize,
    steps: Vec<Box<dyn Step>>,
    disposed: DisposeFlag,
}

impl ParallelStep {
    #[must_use]
    pub fn new(name: impl Into<String>, max_parallelism: usize) -> Self {
        Self {
            id: StepId::new(),
            name: name.into(),
            max_parallelism,
            steps: Vec::new(),
            disposed: DisposeFlag::new(),
        }
    }

    #[must_use]
    pub fn with_step<S>(mut self, step: S) -> Self
    where
        S: Step + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    #[must_use]
    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    async fn fan_out<'a, F, Fut>(
        &'a self,
        cancel: &'a CancellationToken,
        op: F,
    ) -> Result<(), StepError>
    where
        F: Fn(&'a dyn Step) -> Fut,
        Fut: Future<Output = Result<(), StepError>> + Send + 'a,
    {
        let limiter = (self.max_parallelism > 0).then(|| Semaphore::new(self.max_parallelism));
        let limiter = limiter.as_ref();

        let tasks = self.steps.iter().map(|step| {
            let work = op(step.as_ref());
            async move {
                let _permit = match limiter {
                    Some(semaphore) => tokio::select! {
                        permit = semaphore.acquire() => Some(permit.map_err(|_| StepError::Cancelled)?),
                        () = cancel.cancelled() => return Err(StepError::Cancelled),
                    },
                    None => None,
                };
                work.await
            }
        });

        let errors: Vec<StepError> = join_all(tasks)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if errors.is_empty() {
            return Ok(());
        }
        warn!(
            step = %self.name,
            failed = errors.len(),
            total = self.steps.len(),
            "parallel children failed"
        );
        Err(StepError::Aggregate {
            step: self.name.clone(),
            total: self.steps.len(),
            errors,
        })
    }
}

#[async_trait]
impl Step for ParallelStep {
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
        debug!(
            step = %self.name,
            children = self.steps.len(),
            max_parallelism = self.max_parallelism,
            "starting parallel children"
        );
        self.fan_out(cancel, |child| child.execute(ctx, cancel)).await
    }

    async fn compensate(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        self.fan_out(cancel, |child| child.compensate(ctx, cancel)).await
    }

    fn dispose(&self) {
        if self.disposed.try_dispose() {
            for step in &self.steps {
                step.dispose();
            }
        }
    }
}

impl fmt::Debug for ParallelStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("max_parallelism", &self.max_parallelism)
            .field("children", &self.steps.len())
            .finish_non_exhaustive()
    }
}
