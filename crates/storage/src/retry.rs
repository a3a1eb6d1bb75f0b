//! Rate-limit aware execution of remote calls
//!
//! Every remote call goes through [`RetryExecutor::execute`]. A throttled call is
//! re-issued after exactly the delay the server asked for, with no client-side
//! attempt ceiling. Any other failure is returned unchanged on the first attempt.

use crate::error::RemoteError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one invocation of a remote operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<R> {
    Success(R),
    /// Throttled; retry after the server-suggested delay
    RateLimited(Duration),
    Fatal(RemoteError),
}

impl<R> From<Result<R, RemoteError>> for Attempt<R> {
    fn from(result: Result<R, RemoteError>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(err) => match err.retry_after() {
                Some(delay) => Attempt::RateLimited(delay),
                None => Attempt::Fatal(err),
            },
        }
    }
}

/// Throttling observed by an executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// Invocations rejected with a rate-limit signal
    pub throttled_attempts: u64,
    /// Sum of the retry-after delays slept through
    pub total_delay: Duration,
}

/// Executes remote operations, absorbing rate-limit failures
#[derive(Debug, Default)]
pub struct RetryExecutor {
    throttled_attempts: AtomicU64,
    total_delay_micros: AtomicU64,
}

impl RetryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op` until it succeeds or fails with a non-rate-limit error
    ///
    /// `operation` names the call in log output. The operation must be safe to
    /// repeat: it is re-invoked from scratch after every throttled attempt.
    pub async fn execute<R, F, Fut>(&self, operation: &str, mut op: F) -> Result<R, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, RemoteError>>,
    {
        let mut attempt: u64 = 1;
        loop {
            match Attempt::from(op().await) {
                Attempt::Success(value) => {
                    if attempt > 1 {
                        debug!("{operation} succeeded after {attempt} attempts");
                    }
                    return Ok(value);
                }
                Attempt::RateLimited(delay) => {
                    warn!(
                        "{operation} throttled (attempt {attempt}), retrying in {}ms",
                        delay.as_millis()
                    );
                    self.record_throttle(delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Attempt::Fatal(err) => return Err(err),
            }
        }
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            throttled_attempts: self.throttled_attempts.load(Ordering::Relaxed),
            total_delay: Duration::from_micros(self.total_delay_micros.load(Ordering::Relaxed)),
        }
    }

    fn record_throttle(&self, delay: Duration) {
        let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
        self.throttled_attempts.fetch_add(1, Ordering::Relaxed);
        self.total_delay_micros.fetch_add(micros, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_classification() {
        let ok: Result<u32, RemoteError> = Ok(7);
        assert_eq!(Attempt::from(ok), Attempt::Success(7));

        let throttled: Result<u32, RemoteError> =
            Err(RemoteError::throttled(Duration::from_millis(40)));
        assert_eq!(
            Attempt::from(throttled),
            Attempt::RateLimited(Duration::from_millis(40))
        );

        let wrapped: Result<u32, RemoteError> = Err(RemoteError::Aggregate(vec![
            RemoteError::throttled(Duration::from_millis(15)),
        ]));
        assert_eq!(
            Attempt::from(wrapped),
            Attempt::RateLimited(Duration::from_millis(15))
        );

        let fatal: Result<u32, RemoteError> = Err(RemoteError::BadRequest("bad".to_string()));
        assert_eq!(
            Attempt::from(fatal),
            Attempt::Fatal(RemoteError::BadRequest("bad".to_string()))
        );
    }

    #[test]
    fn test_stats_start_empty() {
        assert_eq!(RetryExecutor::new().stats(), RetryStats::default());
    }
}
