use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::context::WorkflowRef;
use crate::error::ConfigError;
use crate::events::EventObserver;
use crate::id::WorkflowId;
use crate::step::{DisposeFlag, Step};

/// An ordered, non-empty sequence of steps with a name and identity.
///
/// A workflow owns its steps exclusively. Dropping it disposes every step
/// once; [`dispose`](Self::dispose) does the same eagerly.
pub struct Workflow {
    id: WorkflowId,
    name: String,
    steps: Vec<Box<dyn Step>>,
    observers: Vec<Arc<dyn EventObserver>>,
    disposed: DisposeFlag,
}

impl Workflow {
    pub(crate) fn from_parts(
        id: WorkflowId,
        name: String,
        steps: Vec<Box<dyn Step>>,
        observers: Vec<Arc<dyn EventObserver>>,
    ) -> Self {
        Self {
            id,
            name,
            steps,
            observers,
            disposed: DisposeFlag::new(),
        }
    }

    /// Build a workflow from a runtime-assembled step list.
    ///
    /// Prefer [`WorkflowBuilder`](crate::WorkflowBuilder) when the steps are
    /// known statically; it rejects empty workflows at compile time.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if `name` is blank or `steps` is empty.
    pub fn from_steps(
        name: impl Into<String>,
        steps: Vec<Box<dyn Step>>,
    ) -> Result<Self, ConfigError> {
        let name = validate_name(name.into())?;
        if steps.is_empty() {
            return Err(ConfigError::Missing { field: "steps" });
        }
        Ok(Self::from_parts(WorkflowId::new(), name, steps, Vec::new()))
    }

    #[must_use]
    pub fn id(&self) -> WorkflowId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    #[must_use]
    pub fn observers(&self) -> &[Arc<dyn EventObserver>] {
        &self.observers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always `false`: workflows cannot be built without steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn reference(&self) -> WorkflowRef {
        WorkflowRef {
            id: self.id,
            name: self.name.clone(),
        }
    }

    /// Dispose every step. Later calls do nothing.
    pub fn dispose(&self) {
        if !self.disposed.try_dispose() {
            return;
        }
        debug!(workflow_id = %self.id, workflow_name = %self.name, "disposing workflow");
        for step in &self.steps {
            step.dispose();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.is_disposed()
    }
}

impl Drop for Workflow {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("id", &self.id)
            .field("name", &self.name)
            .field(
                "steps",
                &self.steps.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

pub(crate) fn validate_name(name: String) -> Result<String, ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Missing { field: "name" });
    }
    Ok(name)
}
