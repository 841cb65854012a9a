use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::events::EventObserver;
use crate::id::WorkflowId;
use crate::step::Step;
use crate::workflow::{Workflow, validate_name};

/// Marker type for a builder with no steps.
pub struct Empty;

/// Marker type for a builder with at least one step.
pub struct HasSteps;

/// Type-state builder for [`Workflow`].
///
/// `build()` only exists once a step has been added, so an empty workflow
/// is rejected at compile time:
///
/// ```compile_fail
/// use flowforge_engine::WorkflowBuilder;
///
/// let workflow = WorkflowBuilder::new().name("empty").build();
/// ```
///
/// The name is checked at build time:
///
/// ```
/// use flowforge_engine::{ActionStep, ConfigError, WorkflowBuilder};
///
/// let result = WorkflowBuilder::new()
///     .step(ActionStep::new("noop", |_, _| async { Ok(()) }))
///     .build();
/// assert!(matches!(result, Err(ConfigError::Missing { field: "name" })));
/// ```
pub struct WorkflowBuilder<State = Empty> {
    id: Option<WorkflowId>,
    name: String,
    steps: Vec<Box<dyn Step>>,
    observers: Vec<Arc<dyn EventObserver>>,
    _state: PhantomData<State>,
}

impl WorkflowBuilder<Empty> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: None,
            name: String::new(),
            steps: Vec::new(),
            observers: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl Default for WorkflowBuilder<Empty> {
    fn default() -> Self {
        Self::new()
    }
}

impl<State> WorkflowBuilder<State> {
    /// Use a fixed id instead of generating one.
    #[must_use]
    pub fn id(mut self, id: WorkflowId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Observer notified of events from runs of this workflow only.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn EventObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Append a step. Steps run in the order they are added.
    #[must_use]
    pub fn step<S>(self, step: S) -> WorkflowBuilder<HasSteps>
    where
        S: Step + 'static,
    {
        let mut steps = self.steps;
        steps.push(Box::new(step));
        WorkflowBuilder {
            id: self.id,
            name: self.name,
            steps,
            observers: self.observers,
            _state: PhantomData,
        }
    }
}

impl WorkflowBuilder<HasSteps> {
    /// Build the workflow from the accumulated steps.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if no name was set.
    pub fn build(self) -> Result<Workflow, ConfigError> {
        let name = validate_name(self.name)?;
        Ok(Workflow::from_parts(
            self.id.unwrap_or_default(),
            name,
            self.steps,
            self.observers,
        ))
    }
}
