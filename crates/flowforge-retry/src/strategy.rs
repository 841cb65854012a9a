use std::time::Duration;

use rand::Rng;

use crate::error::RetryConfigError;

/// A retry policy.
///
/// `retry_count` is the number of failures observed so far. Implementations
/// are stateless and may be shared across concurrent operations.
pub trait RetryStrategy: Send + Sync {
    /// Whether another attempt is allowed after `retry_count` failures.
    fn should_retry(&self, retry_count: u32) -> bool;

    /// How long to wait before the next attempt.
    fn delay(&self, retry_count: u32) -> Duration;

    /// Short identifier used in log fields.
    fn name(&self) -> &'static str;
}

/// Constant delay between attempts, retrying while `retry_count < max_retries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    interval: Duration,
    max_retries: u32,
}

impl FixedInterval {
    #[must_use]
    pub const fn new(interval: Duration, max_retries: u32) -> Self {
        Self {
            interval,
            max_retries,
        }
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl RetryStrategy for FixedInterval {
    fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    fn delay(&self, _retry_count: u32) -> Duration {
        self.interval
    }

    fn name(&self) -> &'static str {
        "fixed-interval"
    }
}

/// Delay doubles with each failure: `initial * 2^retry_count`, never above `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max_interval: Duration,
    max_retries: u32,
}

impl ExponentialBackoff {
    #[must_use]
    pub const fn new(initial: Duration, max_interval: Duration, max_retries: u32) -> Self {
        Self {
            initial,
            max_interval,
            max_retries,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries
    }

    fn delay(&self, retry_count: u32) -> Duration {
        // Overflow of either the factor or the product saturates at the cap.
        2_u32
            .checked_pow(retry_count)
            .and_then(|factor| self.initial.checked_mul(factor))
            .map_or(self.max_interval, |delay| delay.min(self.max_interval))
    }

    fn name(&self) -> &'static str {
        "exponential-backoff"
    }
}

/// Delay sampled uniformly from `[min, max]`.
///
/// This strategy always allows another attempt. Callers must bound it
/// themselves, e.g. with [`Retry::max_attempts`](crate::Retry::max_attempts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomInterval {
    min: Duration,
    max: Duration,
}

impl RandomInterval {
    /// # Errors
    ///
    /// Returns [`RetryConfigError::InvertedInterval`] if `min > max`.
    pub fn new(min: Duration, max: Duration) -> Result<Self, RetryConfigError> {
        if min > max {
            return Err(RetryConfigError::InvertedInterval { min, max });
        }
        Ok(Self { min, max })
    }
}

impl RetryStrategy for RandomInterval {
    fn should_retry(&self, _retry_count: u32) -> bool {
        true
    }

    fn delay(&self, _retry_count: u32) -> Duration {
        let fraction: f64 = rand::thread_rng().r#gen();
        self.min + (self.max - self.min).mul_f64(fraction)
    }

    fn name(&self) -> &'static str {
        "random-interval"
    }
}
