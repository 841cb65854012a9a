use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::WorkflowContext;
use crate::error::StepError;
use crate::step::Step;

/// Wraps the execution of every top-level step.
///
/// A middleware decides whether, when and how many times to call
/// [`Next::run`]. Middlewares registered later wrap those registered
/// earlier: the last one registered is the outermost.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;

    /// Handle one step execution.
    ///
    /// # Errors
    ///
    /// Returns whatever the rest of the chain returned, or a failure raised
    /// by the middleware itself.
    async fn invoke(
        &self,
        step: &dyn Step,
        ctx: &WorkflowContext,
        next: Next<'_>,
    ) -> Result<(), StepError>;
}

/// The remainder of the middleware chain for one step execution.
///
/// `Next` is `Copy`: calling [`run`](Self::run) more than once re-runs the
/// inner chain, which is how retrying middleware works.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    step: &'a dyn Step,
    ctx: &'a WorkflowContext,
    chain: &'a [Arc<dyn Middleware>],
    cancel: &'a CancellationToken,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        step: &'a dyn Step,
        ctx: &'a WorkflowContext,
        chain: &'a [Arc<dyn Middleware>],
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            step,
            ctx,
            chain,
            cancel,
        }
    }

    /// The cancellation token the inner chain will observe.
    #[must_use]
    pub fn cancel(&self) -> &'a CancellationToken {
        self.cancel
    }

    /// Run the inner chain under a different token, e.g. a child token
    /// that a timeout can fire.
    #[must_use]
    pub fn with_cancel<'b>(self, cancel: &'b CancellationToken) -> Next<'b>
    where
        'a: 'b,
    {
        Next {
            step: self.step,
            ctx: self.ctx,
            chain: self.chain,
            cancel,
        }
    }

    /// Invoke the next middleware, or the step itself at the end of the chain.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the inner chain.
    pub async fn run(self) -> Result<(), StepError> {
        match self.chain.split_last() {
            Some((outer, inner)) => {
                let next = Next {
                    chain: inner,
                    ..self
                };
                outer.invoke(self.step, self.ctx, next).await
            }
            None => self.step.execute(self.ctx, self.cancel).await,
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("step", &self.step.name())
            .field("remaining", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// An ordered middleware chain.
#[derive(Clone, Default)]
pub struct Pipeline {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `middleware` as the new outermost layer.
    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Names in registration order, innermost first.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Run `step` through the whole chain.
    ///
    /// # Errors
    ///
    /// Propagates the failure of the chain.
    pub async fn execute(
        &self,
        step: &dyn Step,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        Next::new(step, ctx, &self.middleware, cancel).run().await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::steps::ActionStep;
    use crate::workflow::Workflow;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        async fn invoke(
            &self,
            _step: &dyn Step,
            _ctx: &WorkflowContext,
            next: Next<'_>,
        ) -> Result<(), StepError> {
            self.log.lock().expect("lock").push(format!("{}:before", self.label));
            let result = next.run().await;
            self.log.lock().expect("lock").push(format!("{}:after", self.label));
            result
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        fn name(&self) -> &str {
            "short-circuit"
        }

        async fn invoke(
            &self,
            _step: &dyn Step,
            _ctx: &WorkflowContext,
            _next: Next<'_>,
        ) -> Result<(), StepError> {
            Err(StepError::msg("blocked"))
        }
    }

    struct Twice;

    #[async_trait]
    impl Middleware for Twice {
        fn name(&self) -> &str {
            "twice"
        }

        async fn invoke(
            &self,
            _step: &dyn Step,
            _ctx: &WorkflowContext,
            next: Next<'_>,
        ) -> Result<(), StepError> {
            next.run().await?;
            next.run().await
        }
    }

    fn logging_step(log: &Arc<Mutex<Vec<String>>>) -> ActionStep {
        let log = Arc::clone(log);
        ActionStep::new("work", move |_, _| {
            let log = Arc::clone(&log);
            async move {
                log.lock().expect("lock").push("step".to_string());
                Ok(())
            }
        })
    }

    fn workflow() -> Workflow {
        WorkflowBuilder::new()
            .name("pipeline")
            .step(ActionStep::new("unused", |_, _| async { Ok(()) }))
            .build()
            .expect("valid workflow")
    }

    #[tokio::test]
    async fn empty_pipeline_runs_step() -> anyhow::Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = logging_step(&log);
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf);

        Pipeline::new()
            .execute(&step, &ctx, &CancellationToken::new())
            .await?;

        assert_eq!(*log.lock().expect("lock"), ["step"]);
        Ok(())
    }

    #[tokio::test]
    async fn last_registered_is_outermost() -> anyhow::Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Recorder {
            label: "first",
            log: Arc::clone(&log),
        }));
        pipeline.push(Arc::new(Recorder {
            label: "second",
            log: Arc::clone(&log),
        }));
        let step = logging_step(&log);
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf);

        pipeline
            .execute(&step, &ctx, &CancellationToken::new())
            .await?;

        assert_eq!(
            *log.lock().expect("lock"),
            [
                "second:before",
                "first:before",
                "step",
                "first:after",
                "second:after"
            ]
        );
        assert_eq!(pipeline.names(), ["first", "second"]);
        Ok(())
    }

    #[tokio::test]
    async fn middleware_may_skip_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(ShortCircuit));
        let step = logging_step(&log);
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf);

        let result = pipeline
            .execute(&step, &ctx, &CancellationToken::new())
            .await;

        assert!(result.is_err());
        assert!(log.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn next_can_run_repeatedly() -> anyhow::Result<()> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(Arc::new(Twice));
        let step = logging_step(&log);
        let wf = workflow();
        let ctx = WorkflowContext::new(&wf);

        pipeline
            .execute(&step, &ctx, &CancellationToken::new())
            .await?;

        assert_eq!(log.lock().expect("lock").len(), 2);
        Ok(())
    }
}
