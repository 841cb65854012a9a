use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use flowforge_retry::{FixedInterval, Retry, RetryStrategy};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::context::WorkflowContext;
use crate::error::{CompensationError, StepError, WorkflowError};
use crate::events::{EventObserver, WorkflowEvent};
use crate::id::RunId;
use crate::pipeline::{Middleware, Pipeline};
use crate::settings::WorkflowSettings;
use crate::step::Step;
use crate::workflow::Workflow;

/// Delay between compensation attempts under the default strategy.
pub const DEFAULT_COMPENSATION_DELAY: Duration = Duration::from_millis(100);

/// Executes workflows.
///
/// Steps run strictly in order, each through the middleware pipeline. If a
/// step fails and automatic compensation is enabled, every step that
/// completed is compensated in reverse order before the error is returned.
///
/// The engine bounds how many runs may be in flight on it at once; a
/// nested run reuses its parent's slot when both use the same engine.
/// Cloning is cheap; clones share that bound.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    key: Uuid,
    settings: WorkflowSettings,
    pipeline: Pipeline,
    observers: Vec<Arc<dyn EventObserver>>,
    compensation_strategy: Arc<dyn RetryStrategy>,
    slots: Semaphore,
}

struct Compensation {
    errors: Vec<CompensationError>,
    halted: bool,
}

impl Engine {
    /// An engine with `settings`, no middleware and no observers.
    #[must_use]
    pub fn new(settings: WorkflowSettings) -> Self {
        Self::builder().settings(settings).build()
    }

    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    #[must_use]
    pub fn settings(&self) -> &WorkflowSettings {
        &self.inner.settings
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Execution slots not currently held by a run.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.inner.slots.available_permits()
    }

    /// Run `workflow` to completion as run [`ctx.run_id()`](WorkflowContext::run_id).
    ///
    /// Waits for an execution slot first; the wait is abandoned if `cancel`
    /// fires. Once running, cancellation is checked before every step.
    /// Compensation, once started, is not interrupted by `cancel`.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::Cancelled`] if cancelled while waiting for a slot.
    /// - [`WorkflowError::StepFailed`] if a step failed (including by
    ///   cancellation) and every compensation succeeded or none ran.
    /// - [`WorkflowError::CompensationFailed`] if some compensations failed.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        self.execute_in_slot(workflow, ctx, cancel, ctx.run_id()).await
    }

    /// Run a workflow as a step of another run on `ctx`.
    ///
    /// Each nested execution is a run of its own. If this engine already
    /// holds a slot for the enclosing run it is reused, otherwise a slot of
    /// this engine is acquired like any top-level run.
    pub(crate) async fn execute_nested(
        &self,
        workflow: &Workflow,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), WorkflowError> {
        let run_id = RunId::new();
        if ctx.holds_slot(self.inner.key) {
            return self.run(workflow, ctx, cancel, run_id).await;
        }
        debug!("nested workflow belongs to another engine, acquiring a slot");
        self.execute_in_slot(workflow, ctx, cancel, run_id).await
    }

    async fn execute_in_slot(
        &self,
        workflow: &Workflow,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
        run_id: RunId,
    ) -> Result<(), WorkflowError> {
        let _permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(WorkflowError::Cancelled {
                    workflow: workflow.name().to_string(),
                });
            }
            permit = self.inner.slots.acquire() => permit.map_err(|_| WorkflowError::Cancelled {
                workflow: workflow.name().to_string(),
            })?,
        };
        let _hold = ctx.hold_slot(self.inner.key);

        self.run(workflow, ctx, cancel, run_id).await
    }

    async fn run(
        &self,
        workflow: &Workflow,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
        run_id: RunId,
    ) -> Result<(), WorkflowError> {
        let span = info_span!(
            "workflow",
            correlation_id = %ctx.correlation_id(),
            run_id = %run_id,
            workflow_id = %workflow.id(),
            workflow_name = %workflow.name(),
        );
        self.run_steps(workflow, ctx, cancel, run_id).instrument(span).await
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
        run_id: RunId,
    ) -> Result<(), WorkflowError> {
        let started = Instant::now();
        info!(steps = workflow.len(), "workflow started");
        self.notify(
            workflow,
            &WorkflowEvent::WorkflowStarted {
                workflow_id: workflow.id(),
                workflow_name: workflow.name().to_string(),
                correlation_id: ctx.correlation_id().to_string(),
            },
        );

        let mut completed = 0;
        let mut failure: Option<(&dyn Step, StepError)> = None;

        for (index, step) in workflow.steps().iter().enumerate() {
            let span = info_span!("step", step_id = %step.id(), step_name = %step.name(), index);
            match self.run_step(workflow, step.as_ref(), ctx, cancel).instrument(span).await {
                Ok(()) => completed = index + 1,
                Err(error) => {
                    failure = Some((step.as_ref(), error));
                    break;
                }
            }
        }

        let Some((failed_step, step_error)) = failure else {
            let elapsed = started.elapsed();
            info!(elapsed = ?elapsed, "workflow completed");
            self.notify(
                workflow,
                &WorkflowEvent::WorkflowCompleted {
                    workflow_id: workflow.id(),
                    elapsed,
                },
            );
            return Ok(());
        };

        error!(
            step = %failed_step.name(),
            error = %step_error,
            "workflow failed"
        );

        let compensation = if self.inner.settings.auto_compensate() {
            self.compensate(workflow, run_id, &workflow.steps()[..completed], ctx)
                .await
        } else {
            debug!("automatic compensation disabled");
            Compensation {
                errors: Vec::new(),
                halted: false,
            }
        };

        let error = if compensation.errors.is_empty() {
            WorkflowError::StepFailed {
                workflow: workflow.name().to_string(),
                step: failed_step.name().to_string(),
                source: step_error,
            }
        } else {
            WorkflowError::CompensationFailed {
                workflow: workflow.name().to_string(),
                failed_step: failed_step.name().to_string(),
                step_error,
                compensation_errors: compensation.errors,
                halted: compensation.halted,
            }
        };

        self.notify(
            workflow,
            &WorkflowEvent::WorkflowFailed {
                workflow_id: workflow.id(),
                error: error.to_string(),
            },
        );
        Err(error)
    }

    async fn run_step(
        &self,
        workflow: &Workflow,
        step: &dyn Step,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        if cancel.is_cancelled() {
            warn!("cancelled before step started");
            return Err(StepError::Cancelled);
        }

        self.notify(
            workflow,
            &WorkflowEvent::StepStarting {
                workflow_id: workflow.id(),
                step_id: step.id(),
                step_name: step.name().to_string(),
            },
        );
        debug!("executing step");

        let started = Instant::now();
        match self.inner.pipeline.execute(step, ctx, cancel).await {
            Ok(()) => {
                let elapsed = started.elapsed();
                debug!(elapsed = ?elapsed, "step executed");
                self.notify(
                    workflow,
                    &WorkflowEvent::StepFinished {
                        workflow_id: workflow.id(),
                        step_id: step.id(),
                        step_name: step.name().to_string(),
                        elapsed,
                    },
                );
                Ok(())
            }
            Err(error) => {
                self.notify(
                    workflow,
                    &WorkflowEvent::StepFailed {
                        workflow_id: workflow.id(),
                        step_id: step.id(),
                        step_name: step.name().to_string(),
                        error: error.to_string(),
                    },
                );
                Err(error)
            }
        }
    }

    /// Compensate `completed` in reverse order.
    async fn compensate(
        &self,
        workflow: &Workflow,
        run_id: RunId,
        completed: &[Box<dyn Step>],
        ctx: &WorkflowContext,
    ) -> Compensation {
        let settings = &self.inner.settings;
        let strategy = self.inner.compensation_strategy.as_ref();
        let tracker = ctx.tracker();
        // Rollback must finish even when the run itself was cancelled.
        let cancel = CancellationToken::new();
        let cancel = &cancel;
        let mut errors = Vec::new();

        info!(steps = completed.len(), "compensating completed steps");

        for step in completed.iter().rev() {
            let step: &dyn Step = step.as_ref();
            if tracker.is_compensated(run_id, step.id()) {
                debug!(step = %step.name(), "already compensated, skipping");
                continue;
            }

            let span = info_span!(
                "compensate",
                step_id = %step.id(),
                step_name = %step.name(),
                strategy = strategy.name(),
            );
            let outcome = Retry::new(strategy)
                .max_attempts(settings.compensation_retries())
                .run(cancel, |attempt| async move {
                    debug!(attempt, "compensating step");
                    step.compensate(ctx, cancel).await
                })
                .instrument(span)
                .await;

            match outcome {
                Ok(()) => {
                    tracker.mark_compensated(run_id, step.id());
                    info!(step = %step.name(), "step compensated");
                    self.notify(
                        workflow,
                        &WorkflowEvent::StepCompensated {
                            workflow_id: workflow.id(),
                            step_id: step.id(),
                            step_name: step.name().to_string(),
                        },
                    );
                }
                Err(retry_error) => {
                    let attempts = retry_error.attempts();
                    let error = retry_error.into_last().unwrap_or(StepError::Cancelled);
                    error!(
                        step = %step.name(),
                        attempts,
                        error = %error,
                        "compensation failed"
                    );
                    self.notify(
                        workflow,
                        &WorkflowEvent::CompensationFailed {
                            workflow_id: workflow.id(),
                            step_id: step.id(),
                            step_name: step.name().to_string(),
                            error: error.to_string(),
                            attempts,
                        },
                    );
                    errors.push(CompensationError {
                        step: step.name().to_string(),
                        step_id: step.id(),
                        description: step.compensation_description(),
                        attempts,
                        error,
                    });

                    if !settings.continue_on_compensation_failure() {
                        warn!("halting compensation after first failure");
                        return Compensation {
                            errors,
                            halted: true,
                        };
                    }
                }
            }
        }

        Compensation {
            errors,
            halted: false,
        }
    }

    fn notify(&self, workflow: &Workflow, event: &WorkflowEvent) {
        for observer in self.inner.observers.iter().chain(workflow.observers()) {
            let delivered = catch_unwind(AssertUnwindSafe(|| observer.notify(event)));
            if delivered.is_err() {
                warn!(event = event.kind(), "event observer panicked");
            }
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(WorkflowSettings::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.inner.settings)
            .field("pipeline", &self.inner.pipeline)
            .field("observers", &self.inner.observers.len())
            .field("compensation_strategy", &self.inner.compensation_strategy.name())
            .field("available_slots", &self.available_slots())
            .finish()
    }
}

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    settings: WorkflowSettings,
    pipeline: Pipeline,
    observers: Vec<Arc<dyn EventObserver>>,
    compensation_strategy: Option<Arc<dyn RetryStrategy>>,
}

impl EngineBuilder {
    #[must_use]
    pub fn settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add `middleware` as the new outermost layer of the pipeline.
    #[must_use]
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware + 'static,
    {
        self.pipeline.push(Arc::new(middleware));
        self
    }

    /// Observer notified of events from every run on this engine.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Strategy used between compensation attempts.
    ///
    /// Defaults to a fixed [`DEFAULT_COMPENSATION_DELAY`]. Whatever the
    /// strategy, no step is compensated more than
    /// [`WorkflowSettings::compensation_retries`] times per run.
    #[must_use]
    pub fn compensation_strategy<S>(mut self, strategy: S) -> Self
    where
        S: RetryStrategy + 'static,
    {
        self.compensation_strategy = Some(Arc::new(strategy));
        self
    }

    #[must_use]
    pub fn build(self) -> Engine {
        let settings = self.settings;
        let compensation_strategy = self.compensation_strategy.unwrap_or_else(|| {
            Arc::new(FixedInterval::new(
                DEFAULT_COMPENSATION_DELAY,
                settings.compensation_retries(),
            ))
        });
        let slots = settings.max_concurrent_workflows() as usize;

        Engine {
            inner: Arc::new(EngineInner {
                key: Uuid::new_v4(),
                settings,
                pipeline: self.pipeline,
                observers: self.observers,
                compensation_strategy,
                slots: Semaphore::new(slots),
            }),
        }
    }
}
