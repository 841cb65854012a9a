use std::time::Duration;

use thiserror::Error;

/// Error returned by [`Retry::run`](crate::Retry::run).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RetryError<E> {
    /// The strategy (or the attempt cap) refused another attempt.
    #[error("operation failed after {attempts} attempt(s)")]
    Exhausted {
        /// Number of attempts that were made.
        attempts: u32,
        /// The error from the final attempt.
        #[source]
        last: E,
    },

    /// Cancellation was requested before the operation succeeded.
    #[error("retry cancelled after {attempts} attempt(s)")]
    Cancelled {
        /// Number of attempts that were made before cancellation.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// The error from the last attempt, if the operation ran out of attempts.
    pub fn into_last(self) -> Option<E> {
        match self {
            Self::Exhausted { last, .. } => Some(last),
            Self::Cancelled { .. } => None,
        }
    }
}

/// Invalid strategy parameters.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RetryConfigError {
    #[error("minimum interval {min:?} exceeds maximum interval {max:?}")]
    InvertedInterval { min: Duration, max: Duration },
}
