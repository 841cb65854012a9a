use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::context::WorkflowContext;
use crate::error::StepError;
use crate::id::StepId;
use crate::step::{DisposeFlag, Step};

type Action = Box<
    dyn Fn(WorkflowContext, CancellationToken) -> BoxFuture<'static, Result<(), StepError>>
        + Send
        + Sync,
>;

/// A step built from closures.
///
/// The closures receive owned clones of the context and token, so the
/// returned futures can be `'static`:
///
/// ```
/// use flowforge_engine::ActionStep;
///
/// let step = ActionStep::new("reserve", |ctx, _cancel| async move {
///     ctx.update("reserved", |n: u32| n + 1)?;
///     Ok(())
/// })
/// .with_compensation(|ctx, _cancel| async move {
///     ctx.update("reserved", |n: u32| n.saturating_sub(1))?;
///     Ok(())
/// });
/// ```
pub struct ActionStep {
    id: StepId,
    name: String,
    action: Action,
    compensation: Option<Action>,
    description: Option<String>,
    on_dispose: Option<Box<dyn Fn() + Send + Sync>>,
    disposed: DisposeFlag,
}

fn boxed<F, Fut>(f: F) -> Action
where
    F: Fn(WorkflowContext, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), StepError>> + Send + 'static,
{
    Box::new(move |ctx, cancel| Box::pin(f(ctx, cancel)))
}

impl ActionStep {
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(WorkflowContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        Self {
            id: StepId::new(),
            name: name.into(),
            action: boxed(action),
            compensation: None,
            description: None,
            on_dispose: None,
            disposed: DisposeFlag::new(),
        }
    }

    /// Attach the action that undoes this step.
    #[must_use]
    pub fn with_compensation<F, Fut>(mut self, compensation: F) -> Self
    where
        F: Fn(WorkflowContext, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), StepError>> + Send + 'static,
    {
        self.compensation = Some(boxed(compensation));
        self
    }

    /// Override the default "undo {name}" compensation description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Hook run once when the step is disposed.
    #[must_use]
    pub fn on_dispose<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_dispose = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn has_compensation(&self) -> bool {
        self.compensation.is_some()
    }
}

#[async_trait]
impl Step for ActionStep {
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
        (self.action)(ctx.clone(), cancel.clone()).await
    }

    async fn compensate(
        &self,
        ctx: &WorkflowContext,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        match &self.compensation {
            Some(compensation) => compensation(ctx.clone(), cancel.clone()).await,
            None => Ok(()),
        }
    }

    fn dispose(&self) {
        if !self.disposed.try_dispose() {
            return;
        }
        if let Some(hook) = &self.on_dispose {
            hook();
        }
    }

    fn compensation_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("undo {}", self.name))
    }
}

impl fmt::Debug for ActionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStep")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("has_compensation", &self.compensation.is_some())
            .finish_non_exhaustive()
    }
}
