//! Bounded polling for asynchronous remote state transitions
//!
//! Several remote resources accept a mutation and then converge in the
//! background (certificate issuance, hostname fallback deployment). The
//! reconciler waits for the terminal state with a fixed interval and a fixed
//! attempt budget; transitional conditions keep polling, everything else
//! aborts immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::PollError;

/// Fixed-interval, fixed-budget polling schedule.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay between attempts.
    pub interval: Duration,

    /// Total number of attempts before giving up.
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Derive the attempt budget from an overall timeout.
    ///
    /// The budget is `ceil(timeout / interval)` with a minimum of one attempt.
    pub fn with_timeout(interval: Duration, timeout: Duration) -> Self {
        let interval_ms = interval.as_millis().max(1);
        let attempts = timeout.as_millis().div_ceil(interval_ms).max(1);
        Self {
            interval,
            max_attempts: attempts as u32,
        }
    }
}

impl Default for PollPolicy {
    /// One minute of five-second attempts, matching the default timeout
    /// remote provisioning is expected to complete within.
    fn default() -> Self {
        Self::with_timeout(Duration::from_secs(5), Duration::from_secs(60))
    }
}

/// One observation of the remote entity during a polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// The entity reached its terminal state.
    Ready(T),

    /// The entity is still transitioning; the string describes the
    /// condition observed (logged and reported on timeout).
    Pending(String),
}

/// Run `op` until it reports [`Poll::Ready`], the attempt budget is spent,
/// or it fails with a non-retryable error.
///
/// Retryability is decided by the operation itself: returning
/// `Ok(Poll::Pending(..))` continues the loop, returning `Err(..)` aborts.
pub async fn poll_until<T, E, F, Fut>(policy: &PollPolicy, mut op: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, E>>,
{
    let mut last = String::new();
    for attempt in 0..policy.max_attempts {
        match op().await {
            Ok(Poll::Ready(value)) => return Ok(value),
            Ok(Poll::Pending(reason)) => {
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = policy.max_attempts,
                    "still pending: {reason}"
                );
                last = reason;
            }
            Err(err) => return Err(PollError::Aborted(err)),
        }

        if attempt + 1 < policy.max_attempts {
            sleep(policy.interval).await;
        }
    }

    Err(PollError::TimedOut {
        attempts: policy.max_attempts,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("remote failure")]
    struct RemoteFailure;

    #[tokio::test]
    async fn ready_on_first_attempt() {
        let policy = PollPolicy::new(Duration::from_millis(1), 5);
        let result: Result<u32, PollError<RemoteFailure>> =
            poll_until(&policy, || async { Ok(Poll::Ready(7)) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn times_out_after_exactly_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = PollPolicy::new(Duration::from_millis(1), 4);

        let result: Result<(), PollError<RemoteFailure>> = poll_until(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Poll::Pending("status pending".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(PollError::TimedOut { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last, "status pending");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn aborts_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let policy = PollPolicy::new(Duration::from_millis(1), 10);

        let result: Result<(), PollError<RemoteFailure>> = poll_until(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(RemoteFailure) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(PollError::Aborted(_))));
    }

    #[tokio::test]
    async fn becomes_ready_mid_loop() {
        let calls = AtomicU32::new(0);
        let policy = PollPolicy::new(Duration::from_millis(1), 10);

        let result: Result<&str, PollError<RemoteFailure>> = poll_until(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Ok(Poll::Pending("deploying".to_string()))
                } else {
                    Ok(Poll::Ready("active"))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "active");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn budget_from_timeout() {
        let policy = PollPolicy::with_timeout(Duration::from_secs(5), Duration::from_secs(60));
        assert_eq!(policy.max_attempts, 12);

        let uneven = PollPolicy::with_timeout(Duration::from_secs(7), Duration::from_secs(60));
        assert_eq!(uneven.max_attempts, 9);

        let tiny = PollPolicy::with_timeout(Duration::from_secs(30), Duration::from_secs(1));
        assert_eq!(tiny.max_attempts, 1);
    }
}
