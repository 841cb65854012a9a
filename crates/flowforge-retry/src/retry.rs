use std::fmt::Display;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RetryError;
use crate::strategy::RetryStrategy;

/// Runs an async operation under a [`RetryStrategy`].
///
/// After every failure the retry count is incremented and the strategy is
/// asked whether to continue. An optional hard cap on the total number of
/// attempts bounds strategies that never stop on their own.
///
/// ```
/// use std::time::Duration;
///
/// use flowforge_retry::{FixedInterval, Retry};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn demo() -> Result<(), flowforge_retry::RetryError<std::io::Error>> {
/// let strategy = FixedInterval::new(Duration::from_millis(10), 3);
/// let cancel = CancellationToken::new();
///
/// let value = Retry::new(&strategy)
///     .run(&cancel, |_attempt| async { Ok::<_, std::io::Error>(42) })
///     .await?;
/// assert_eq!(value, 42);
/// # Ok(())
/// # }
/// ```
pub struct Retry<'a, S: ?Sized> {
    strategy: &'a S,
    max_attempts: Option<u32>,
}

impl<'a, S> Retry<'a, S>
where
    S: RetryStrategy + ?Sized,
{
    #[must_use]
    pub fn new(strategy: &'a S) -> Self {
        Self {
            strategy,
            max_attempts: None,
        }
    }

    /// Never make more than `max_attempts` attempts, whatever the strategy says.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Run `operation` until it succeeds, the policy gives up, or `cancel` fires.
    ///
    /// The closure receives the zero-based attempt index.
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Exhausted`] carrying the last failure when no
    /// further attempt is allowed, or [`RetryError::Cancelled`] if the token is
    /// cancelled before or between attempts.
    pub async fn run<F, Fut, T, E>(
        self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut retry_count = 0_u32;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    attempts: retry_count,
                });
            }

            let error = match operation(retry_count).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            retry_count = retry_count.saturating_add(1);
            let capped = self.max_attempts.is_some_and(|max| retry_count >= max);

            if capped || !self.strategy.should_retry(retry_count) {
                debug!(
                    strategy = self.strategy.name(),
                    attempts = retry_count,
                    capped,
                    error = %error,
                    "giving up"
                );
                return Err(RetryError::Exhausted {
                    attempts: retry_count,
                    last: error,
                });
            }

            let delay = self.strategy.delay(retry_count);
            warn!(
                strategy = self.strategy.name(),
                attempt = retry_count,
                delay = ?delay,
                error = %error,
                "attempt failed, retrying"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: retry_count });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::strategy::{FixedInterval, RandomInterval};

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("attempt {0} failed")]
    struct AttemptError(u32);

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_first_attempt() -> anyhow::Result<()> {
        let strategy = FixedInterval::new(Duration::from_millis(10), 3);
        let calls = AtomicU32::new(0);

        let value = Retry::new(&strategy)
            .run(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, AttemptError>("done") }
            })
            .await?;

        assert_eq!(value, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_strategy_makes_max_attempts() {
        let strategy = FixedInterval::new(Duration::from_millis(10), 3);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = Retry::new(&strategy)
            .run(&CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(AttemptError(attempt)) }
            })
            .await;

        let err = result.expect_err("always failing operation");
        assert_eq!(err.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.into_last(), Some(AttemptError(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() -> anyhow::Result<()> {
        let strategy = FixedInterval::new(Duration::from_millis(5), 5);

        let value = Retry::new(&strategy)
            .run(&CancellationToken::new(), |attempt| async move {
                if attempt < 2 {
                    Err(AttemptError(attempt))
                } else {
                    Ok(attempt)
                }
            })
            .await?;

        assert_eq!(value, 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cap_bounds_random_strategy() -> anyhow::Result<()> {
        let strategy = RandomInterval::new(Duration::from_millis(1), Duration::from_millis(3))?;
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = Retry::new(&strategy)
            .max_attempts(4)
            .run(&CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(AttemptError(attempt)) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Exhausted { attempts: 4, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_delay() {
        let strategy = FixedInterval::new(Duration::from_secs(3600), 10);
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let counter = Arc::clone(&calls);
        let result: Result<(), _> = Retry::new(&strategy)
            .run(&cancel, move |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(AttemptError(attempt)) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_cancelled_token_skips_operation() {
        let strategy = FixedInterval::new(Duration::ZERO, 3);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), RetryError<AttemptError>> = Retry::new(&strategy)
            .run(&cancel, |_| async { Ok(()) })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
    }
}
