use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::error::ContextError;
use crate::id::{RunId, WorkflowId};
use crate::services::Services;
use crate::tracker::CompensationTracker;
use crate::workflow::Workflow;

type Value = Box<dyn Any + Send + Sync>;

/// Identity of the workflow a context was created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRef {
    pub id: WorkflowId,
    pub name: String,
}

/// Shared state for one workflow run.
///
/// Cloning is cheap and every clone sees the same data. All key/value
/// operations are safe under concurrent access from parallel child steps;
/// [`update`](Self::update) is an atomic read-modify-write.
#[derive(Clone)]
pub struct WorkflowContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    correlation_id: String,
    run_id: RunId,
    workflow: WorkflowRef,
    data: DashMap<String, Value>,
    // Engines currently holding an execution slot for a run on this context.
    slot_holders: DashMap<Uuid, usize>,
    tracker: Arc<CompensationTracker>,
    services: Services,
}

impl WorkflowContext {
    /// A context with a generated correlation id and a fresh tracker.
    #[must_use]
    pub fn new(workflow: &Workflow) -> Self {
        Self::builder(workflow).build()
    }

    #[must_use]
    pub fn builder(workflow: &Workflow) -> ContextBuilder {
        ContextBuilder {
            workflow: workflow.reference(),
            correlation_id: None,
            run_id: None,
            tracker: None,
            services: Services::new(),
        }
    }

    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.inner.correlation_id
    }

    /// Id of the top-level run this context belongs to.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.inner.run_id
    }

    #[must_use]
    pub fn workflow(&self) -> &WorkflowRef {
        &self.inner.workflow
    }

    #[must_use]
    pub fn tracker(&self) -> &Arc<CompensationTracker> {
        &self.inner.tracker
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn set<T>(&self, key: impl Into<String>, value: T)
    where
        T: Any + Send + Sync,
    {
        self.inner.data.insert(key.into(), Box::new(value));
    }

    /// Read a copy of the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::KeyNotFound`] if nothing is stored under `key`,
    /// or [`ContextError::TypeMismatch`] if the stored value is not a `T`.
    pub fn get<T>(&self, key: &str) -> Result<T, ContextError>
    where
        T: Any + Clone,
    {
        self.try_get(key)?.ok_or_else(|| ContextError::KeyNotFound {
            key: key.to_string(),
        })
    }

    /// Read the value under `key`, or `T::default()` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the stored value is not a `T`.
    pub fn get_or_default<T>(&self, key: &str) -> Result<T, ContextError>
    where
        T: Any + Clone + Default,
    {
        Ok(self.try_get(key)?.unwrap_or_default())
    }

    /// Read the value under `key` if present.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the stored value is not a `T`.
    pub fn try_get<T>(&self, key: &str) -> Result<Option<T>, ContextError>
    where
        T: Any + Clone,
    {
        let Some(entry) = self.inner.data.get(key) else {
            return Ok(None);
        };
        let value: &(dyn Any + Send + Sync) = &**entry.value();
        value
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| mismatch::<T>(key))
    }

    /// Atomically replace the value under `key` with `f(current)`.
    ///
    /// An absent key starts from `T::default()`. The entry stays locked while
    /// `f` runs, so concurrent updates never lose writes. Returns the new value.
    ///
    /// `f` must not touch this context (or any clone of it): the lock is held
    /// for the whole call and re-entering the map can deadlock. Read what `f`
    /// needs beforehand.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::TypeMismatch`] if the stored value is not a `T`;
    /// the stored value is left untouched.
    pub fn update<T, F>(&self, key: impl Into<String>, f: F) -> Result<T, ContextError>
    where
        T: Any + Clone + Default + Send + Sync,
        F: FnOnce(T) -> T,
    {
        match self.inner.data.entry(key.into()) {
            Entry::Occupied(mut entry) => {
                let stored: &(dyn Any + Send + Sync) = &**entry.get();
                let current = stored
                    .downcast_ref::<T>()
                    .cloned()
                    .ok_or_else(|| mismatch::<T>(entry.key()))?;
                let next = f(current);
                entry.insert(Box::new(next.clone()));
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = f(T::default());
                entry.insert(Box::new(next.clone()));
                Ok(next)
            }
        }
    }

    /// Remove `key`; returns whether anything was stored.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.data.remove(key).is_some()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.data.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.data.is_empty()
    }
}

impl WorkflowContext {
    /// Record that `engine` holds a slot for a run on this context until the
    /// returned guard drops.
    pub(crate) fn hold_slot(&self, engine: Uuid) -> SlotHold {
        *self.inner.slot_holders.entry(engine).or_insert(0) += 1;
        SlotHold {
            ctx: self.clone(),
            engine,
        }
    }

    pub(crate) fn holds_slot(&self, engine: Uuid) -> bool {
        self.inner.slot_holders.contains_key(&engine)
    }
}

pub(crate) struct SlotHold {
    ctx: WorkflowContext,
    engine: Uuid,
}

impl Drop for SlotHold {
    fn drop(&mut self) {
        self.ctx
            .inner
            .slot_holders
            .remove_if_mut(&self.engine, |_, held| {
                *held -= 1;
                *held == 0
            });
    }
}

fn mismatch<T>(key: &str) -> ContextError {
    ContextError::TypeMismatch {
        key: key.to_string(),
        expected: type_name::<T>(),
    }
}

impl fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("correlation_id", &self.inner.correlation_id)
            .field("workflow", &self.inner.workflow)
            .field("keys", &self.inner.data.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`WorkflowContext`].
#[derive(Debug)]
pub struct ContextBuilder {
    workflow: WorkflowRef,
    correlation_id: Option<String>,
    run_id: Option<RunId>,
    tracker: Option<Arc<CompensationTracker>>,
    services: Services,
}

impl ContextBuilder {
    /// Use a caller-supplied correlation id instead of generating one.
    #[must_use]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Continue an earlier run instead of starting a new one.
    ///
    /// Together with that run's tracker, steps it already compensated are
    /// skipped.
    #[must_use]
    pub fn run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Share a tracker with other contexts, e.g. to resume a rollback.
    #[must_use]
    pub fn tracker(mut self, tracker: Arc<CompensationTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    #[must_use]
    pub fn services(mut self, services: Services) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn service<T>(mut self, service: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.services.insert(service);
        self
    }

    #[must_use]
    pub fn build(self) -> WorkflowContext {
        WorkflowContext {
            inner: Arc::new(ContextInner {
                correlation_id: self
                    .correlation_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                run_id: self.run_id.unwrap_or_default(),
                workflow: self.workflow,
                data: DashMap::new(),
                slot_holders: DashMap::new(),
                tracker: self.tracker.unwrap_or_default(),
                services: self.services,
            }),
        }
    }
}
