//! Retry policies for async operations.
//!
//! A [`RetryStrategy`] is a pure policy: given how many failures have been
//! observed it decides whether another attempt is allowed and how long to
//! wait before it. [`Retry`] applies a strategy to an arbitrary async
//! operation, optionally bounded by a hard attempt cap.
//!
//! Three strategies are provided:
//!
//! - [`FixedInterval`]: constant delay, retries while `count < max`.
//! - [`ExponentialBackoff`]: `initial * 2^count`, capped at a maximum delay.
//! - [`RandomInterval`]: delay sampled from `[min, max]`, never stops on its own.

mod error;
mod retry;
mod strategy;

pub use error::{RetryConfigError, RetryError};
pub use retry::Retry;
pub use strategy::{ExponentialBackoff, FixedInterval, RandomInterval, RetryStrategy};
