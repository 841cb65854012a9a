use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::events::{EventObserver, WorkflowEvent};
use crate::id::StepId;

/// Status of a step in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepStatus {
    /// Step started and has not finished yet.
    Running,
    /// Step executed successfully.
    Executed,
    /// Step failed during execution.
    Failed,
    /// Step was compensated successfully.
    Compensated,
    /// Step compensation failed.
    CompensationFailed,
}

/// Record of one step execution.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub step_id: StepId,
    pub name: String,
    pub status: StepStatus,
    /// When the step started executing.
    pub started_at: Instant,
    /// When the step last changed status (execution or compensation).
    pub completed_at: Option<Instant>,
    /// Execution time reported by the engine.
    pub elapsed: Option<Duration>,
    /// Failure message, for failed executions or compensations.
    pub error: Option<String>,
}

/// Observer that keeps a per-step history of workflow runs.
///
/// Register it with [`EngineBuilder::observer`](crate::EngineBuilder::observer)
/// or [`WorkflowBuilder::observer`](crate::WorkflowBuilder::observer) and read
/// it back after the run.
#[derive(Debug, Default)]
pub struct AuditLog {
    records: Mutex<Vec<StepRecord>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StepRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of all records, in start order.
    #[must_use]
    pub fn records(&self) -> Vec<StepRecord> {
        self.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// One line per step, prefixed by a status symbol.
    #[must_use]
    pub fn summary(&self) -> String {
        self.lock()
            .iter()
            .map(|record| {
                let status = match record.status {
                    StepStatus::Running => "…",
                    StepStatus::Executed => "✓",
                    StepStatus::Failed => "✗",
                    StepStatus::Compensated => "↩",
                    StepStatus::CompensationFailed => "⚠",
                };
                format!("{status} {}", record.name)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn update(&self, step_id: StepId, status: StepStatus, error: Option<&str>) {
        let mut records = self.lock();
        // Latest record for the step: a step may run in several workflows sharing this log.
        if let Some(record) = records.iter_mut().rev().find(|r| r.step_id == step_id) {
            record.status = status;
            record.completed_at = Some(Instant::now());
            if let Some(error) = error {
                record.error = Some(error.to_string());
            }
        }
    }
}

impl EventObserver for AuditLog {
    fn notify(&self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::StepStarting {
                step_id, step_name, ..
            } => self.lock().push(StepRecord {
                step_id: *step_id,
                name: step_name.clone(),
                status: StepStatus::Running,
                started_at: Instant::now(),
                completed_at: None,
                elapsed: None,
                error: None,
            }),
            WorkflowEvent::StepFinished {
                step_id, elapsed, ..
            } => {
                self.update(*step_id, StepStatus::Executed, None);
                let mut records = self.lock();
                if let Some(record) = records.iter_mut().rev().find(|r| r.step_id == *step_id) {
                    record.elapsed = Some(*elapsed);
                }
            }
            WorkflowEvent::StepFailed { step_id, error, .. } => {
                self.update(*step_id, StepStatus::Failed, Some(error));
            }
            WorkflowEvent::StepCompensated { step_id, .. } => {
                self.update(*step_id, StepStatus::Compensated, None);
            }
            WorkflowEvent::CompensationFailed { step_id, error, .. } => {
                self.update(*step_id, StepStatus::CompensationFailed, Some(error));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::WorkflowId;

    fn starting(workflow_id: WorkflowId, step_id: StepId, name: &str) -> WorkflowEvent {
        WorkflowEvent::StepStarting {
            workflow_id,
            step_id,
            step_name: name.to_string(),
        }
    }

    #[test]
    fn new_audit_log_is_empty() {
        let log = AuditLog::new();
        assert!(log.is_empty());
        assert_eq!(log.summary(), "");
    }

    #[test]
    fn starting_adds_running_record() {
        let log = AuditLog::new();
        let (wf, step) = (WorkflowId::new(), StepId::new());

        log.notify(&starting(wf, step, "reserve"));

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "reserve");
        assert_eq!(records[0].status, StepStatus::Running);
        assert!(records[0].completed_at.is_none());
    }

    #[test]
    fn finished_marks_executed_with_elapsed() {
        let log = AuditLog::new();
        let (wf, step) = (WorkflowId::new(), StepId::new());

        log.notify(&starting(wf, step, "reserve"));
        log.notify(&WorkflowEvent::StepFinished {
            workflow_id: wf,
            step_id: step,
            step_name: "reserve".to_string(),
            elapsed: Duration::from_millis(5),
        });

        let record = &log.records()[0];
        assert_eq!(record.status, StepStatus::Executed);
        assert_eq!(record.elapsed, Some(Duration::from_millis(5)));
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn compensation_updates_matching_step_only() {
        let log = AuditLog::new();
        let wf = WorkflowId::new();
        let (a, b) = (StepId::new(), StepId::new());

        // Same name, different steps.
        log.notify(&starting(wf, a, "io"));
        log.notify(&starting(wf, b, "io"));
        log.notify(&WorkflowEvent::StepCompensated {
            workflow_id: wf,
            step_id: a,
            step_name: "io".to_string(),
        });

        let records = log.records();
        assert_eq!(records[0].status, StepStatus::Compensated);
        assert_eq!(records[1].status, StepStatus::Running);
    }

    #[test]
    fn summary_uses_status_symbols() {
        let log = AuditLog::new();
        let wf = WorkflowId::new();
        let (a, b, c) = (StepId::new(), StepId::new(), StepId::new());

        log.notify(&starting(wf, a, "reserve"));
        log.notify(&starting(wf, b, "charge"));
        log.notify(&starting(wf, c, "ship"));
        log.notify(&WorkflowEvent::StepFailed {
            workflow_id: wf,
            step_id: c,
            step_name: "ship".to_string(),
            error: "no courier".to_string(),
        });
        log.notify(&WorkflowEvent::CompensationFailed {
            workflow_id: wf,
            step_id: b,
            step_name: "charge".to_string(),
            error: "gateway down".to_string(),
            attempts: 3,
        });
        log.notify(&WorkflowEvent::StepCompensated {
            workflow_id: wf,
            step_id: a,
            step_name: "reserve".to_string(),
        });

        assert_eq!(log.summary(), "↩ reserve\n⚠ charge\n✗ ship");
        assert_eq!(log.records()[2].error.as_deref(), Some("no courier"));
    }

    #[test]
    fn clear_drops_history() {
        let log = AuditLog::new();
        log.notify(&starting(WorkflowId::new(), StepId::new(), "x"));

        log.clear();

        assert!(log.is_empty());
    }
}
