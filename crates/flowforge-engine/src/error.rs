use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::id::StepId;

/// Boxed error used to carry arbitrary user failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single step, or of a step's compensation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepError {
    /// A plain failure with a message.
    #[error("{message}")]
    Failed { message: String },

    /// Any other error raised by user code.
    #[error(transparent)]
    Source(BoxError),

    /// A retrying step ran out of attempts.
    #[error("step '{step}' failed after {attempts} attempt(s)")]
    RetriesExhausted {
        step: String,
        attempts: u32,
        #[source]
        last: Box<StepError>,
    },

    /// One or more children of a composite step failed.
    #[error("{} of {total} child step(s) of '{step}' failed", errors.len())]
    Aggregate {
        step: String,
        total: usize,
        errors: Vec<StepError>,
    },

    /// The cancellation token fired.
    #[error("step cancelled")]
    Cancelled,

    /// The step did not finish within its time limit.
    #[error("step '{step}' timed out after {timeout:?}")]
    Timeout { step: String, timeout: Duration },

    /// A failure rewrapped by error-handling middleware.
    #[error("step '{step}' failed")]
    Translated {
        step: String,
        #[source]
        source: Box<StepError>,
    },

    /// A nested workflow run failed.
    #[error("nested workflow '{workflow}' failed")]
    Nested {
        workflow: String,
        #[source]
        source: Box<WorkflowError>,
    },

    /// Reading from the shared context failed.
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl StepError {
    /// Shorthand for [`StepError::Failed`].
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Wrap any error type.
    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Source(error.into())
    }

    /// Whether this failure was caused by cancellation, directly or through wrappers.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::RetriesExhausted { last: source, .. } | Self::Translated { source, .. } => {
                source.is_cancelled()
            }
            Self::Nested { source, .. } => match &**source {
                WorkflowError::Cancelled { .. } => true,
                other => other.step_error().is_some_and(StepError::is_cancelled),
            },
            _ => false,
        }
    }
}

/// Error from a failed compensation.
#[derive(Debug, Error)]
#[error("compensation failed for step '{step}': {description}")]
pub struct CompensationError {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// Id of the step whose compensation failed.
    pub step_id: StepId,
    /// Description of what the compensation was trying to do.
    pub description: String,
    /// Number of compensation attempts made.
    pub attempts: u32,
    /// The error from the last attempt.
    #[source]
    pub error: StepError,
}

/// Error from a workflow run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WorkflowError {
    /// The run was cancelled before it acquired an execution slot.
    #[error("workflow '{workflow}' cancelled before it started")]
    Cancelled { workflow: String },

    /// A step failed; every compensation that ran succeeded.
    #[error("workflow '{workflow}' failed at step '{step}'")]
    StepFailed {
        workflow: String,
        step: String,
        #[source]
        source: StepError,
    },

    /// A step failed and some compensations also failed.
    #[error(
        "workflow '{workflow}' failed at step '{failed_step}', and {} compensation(s) also failed",
        compensation_errors.len()
    )]
    CompensationFailed {
        workflow: String,
        failed_step: String,
        #[source]
        step_error: StepError,
        compensation_errors: Vec<CompensationError>,
        /// Compensation stopped at the first failure instead of continuing.
        halted: bool,
    },
}

impl WorkflowError {
    /// The error of the step that made the run fail, if a step ran at all.
    #[must_use]
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::Cancelled { .. } => None,
            Self::StepFailed { source, .. } => Some(source),
            Self::CompensationFailed { step_error, .. } => Some(step_error),
        }
    }

    /// Compensation failures collected during rollback.
    #[must_use]
    pub fn compensation_errors(&self) -> &[CompensationError] {
        match self {
            Self::CompensationFailed {
                compensation_errors,
                ..
            } => compensation_errors,
            _ => &[],
        }
    }
}

/// Invalid engine, settings or step configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("missing required {field}")]
    Missing { field: &'static str },

    #[error("failed to parse settings")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read settings file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Failed lookup in a [`WorkflowContext`](crate::WorkflowContext).
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContextError {
    #[error("key '{key}' not found in workflow context")]
    KeyNotFound { key: String },

    #[error("value under key '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("no service of type {service} registered")]
    MissingService { service: &'static str },
}
