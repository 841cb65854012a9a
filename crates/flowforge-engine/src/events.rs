use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::id::{StepId, WorkflowId};

/// Lifecycle notification emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WorkflowEvent {
    WorkflowStarted {
        workflow_id: WorkflowId,
        workflow_name: String,
        correlation_id: String,
    },
    StepStarting {
        workflow_id: WorkflowId,
        step_id: StepId,
        step_name: String,
    },
    StepFinished {
        workflow_id: WorkflowId,
        step_id: StepId,
        step_name: String,
        elapsed: Duration,
    },
    StepFailed {
        workflow_id: WorkflowId,
        step_id: StepId,
        step_name: String,
        error: String,
    },
    StepCompensated {
        workflow_id: WorkflowId,
        step_id: StepId,
        step_name: String,
    },
    CompensationFailed {
        workflow_id: WorkflowId,
        step_id: StepId,
        step_name: String,
        error: String,
        attempts: u32,
    },
    WorkflowCompleted {
        workflow_id: WorkflowId,
        elapsed: Duration,
    },
    WorkflowFailed {
        workflow_id: WorkflowId,
        error: String,
    },
}

impl WorkflowEvent {
    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        match self {
            Self::WorkflowStarted { workflow_id, .. }
            | Self::StepStarting { workflow_id, .. }
            | Self::StepFinished { workflow_id, .. }
            | Self::StepFailed { workflow_id, .. }
            | Self::StepCompensated { workflow_id, .. }
            | Self::CompensationFailed { workflow_id, .. }
            | Self::WorkflowCompleted { workflow_id, .. }
            | Self::WorkflowFailed { workflow_id, .. } => *workflow_id,
        }
    }

    /// The step the event is about, for step-level events.
    #[must_use]
    pub fn step_id(&self) -> Option<StepId> {
        match self {
            Self::StepStarting { step_id, .. }
            | Self::StepFinished { step_id, .. }
            | Self::StepFailed { step_id, .. }
            | Self::StepCompensated { step_id, .. }
            | Self::CompensationFailed { step_id, .. } => Some(*step_id),
            Self::WorkflowStarted { .. }
            | Self::WorkflowCompleted { .. }
            | Self::WorkflowFailed { .. } => None,
        }
    }

    /// Short kind label, e.g. for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::WorkflowStarted { .. } => "workflow-started",
            Self::StepStarting { .. } => "step-starting",
            Self::StepFinished { .. } => "step-finished",
            Self::StepFailed { .. } => "step-failed",
            Self::StepCompensated { .. } => "step-compensated",
            Self::CompensationFailed { .. } => "compensation-failed",
            Self::WorkflowCompleted { .. } => "workflow-completed",
            Self::WorkflowFailed { .. } => "workflow-failed",
        }
    }
}

/// Receives lifecycle events.
///
/// Observers are called synchronously from the running workflow and must
/// not block. A panicking observer is logged and otherwise ignored.
pub trait EventObserver: Send + Sync {
    fn notify(&self, event: &WorkflowEvent);
}

/// Observer that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EventObserver for NoopObserver {
    fn notify(&self, _event: &WorkflowEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelObserver {
    /// Create an observer together with the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventObserver for ChannelObserver {
    fn notify(&self, event: &WorkflowEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event.clone());
    }
}

/// Adapts a closure into an [`EventObserver`].
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(&WorkflowEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventObserver for FnObserver<F>
where
    F: Fn(&WorkflowEvent) + Send + Sync,
{
    fn notify(&self, event: &WorkflowEvent) {
        (self.0)(event);
    }
}

impl<F> fmt::Debug for FnObserver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnObserver")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn started() -> WorkflowEvent {
        WorkflowEvent::WorkflowStarted {
            workflow_id: WorkflowId::new(),
            workflow_name: "wf".to_string(),
            correlation_id: "c-1".to_string(),
        }
    }

    #[test]
    fn step_events_carry_step_id() {
        let step_id = StepId::new();
        let event = WorkflowEvent::StepCompensated {
            workflow_id: WorkflowId::new(),
            step_id,
            step_name: "reserve".to_string(),
        };

        assert_eq!(event.step_id(), Some(step_id));
        assert_eq!(event.kind(), "step-compensated");
        assert_eq!(started().step_id(), None);
    }

    #[tokio::test]
    async fn channel_observer_forwards_events() {
        let (observer, mut receiver) = ChannelObserver::channel();
        let event = started();

        observer.notify(&event);

        assert_eq!(receiver.recv().await, Some(event));
    }

    #[test]
    fn channel_observer_tolerates_closed_receiver() {
        let (observer, receiver) = ChannelObserver::channel();
        drop(receiver);

        observer.notify(&started());
    }

    #[test]
    fn fn_observer_invokes_closure() {
        let seen = Mutex::new(Vec::new());
        let observer = FnObserver::new(|event: &WorkflowEvent| {
            seen.lock().expect("lock").push(event.kind());
        });

        observer.notify(&started());
        NoopObserver.notify(&started());

        assert_eq!(*seen.lock().expect("lock"), ["workflow-started"]);
    }
}
