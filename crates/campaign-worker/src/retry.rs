//! Retry helper for operations that must eventually succeed.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time;

/// How often and how long to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between attempts.
    pub delay: Duration,
    /// Total attempts allowed, `None` to retry until cancelled.
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts.max(1)),
        }
    }
}

/// Result of [`retry_until`].
#[derive(Debug, PartialEq, Eq)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded.
    Done(T),
    /// Cancellation was observed before the next attempt.
    Cancelled,
    /// Attempts ran out; carries the last error.
    Exhausted(E),
}

/// Run `op` until it succeeds, the policy runs out of attempts, or
/// `is_cancelled` returns true. Cancellation is checked before every retry,
/// never in the middle of an attempt.
pub async fn retry_until<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    is_cancelled: C,
    mut op: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn() -> bool,
    E: Display,
{
    let mut attempt = 1u32;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return RetryOutcome::Done(value),
            Err(err) => err,
        };

        if policy.max_attempts.is_some_and(|max| attempt >= max) {
            tracing::error!(attempt, error = %err, "Giving up after final attempt");
            return RetryOutcome::Exhausted(err);
        }
        tracing::warn!(
            attempt,
            error = %err,
            retry_in_ms = policy.delay.as_millis() as u64,
            "Attempt failed, retrying"
        );

        if is_cancelled() {
            return RetryOutcome::Cancelled;
        }
        time::sleep(policy.delay).await;
        if is_cancelled() {
            return RetryOutcome::Cancelled;
        }
        attempt = attempt.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    const DELAY: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let outcome = retry_until(&RetryPolicy::unbounded(DELAY), || false, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err("unavailable")
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(outcome, RetryOutcome::Done(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bounded_policy_exhausts() {
        let outcome: RetryOutcome<(), &str> =
            retry_until(&RetryPolicy::bounded(DELAY, 2), || false, |_| async {
                Err("down")
            })
            .await;
        assert_eq!(outcome, RetryOutcome::Exhausted("down"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_unbounded_retry() {
        let cancelled = AtomicBool::new(false);
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<(), &str> = retry_until(
            &RetryPolicy::unbounded(DELAY),
            || cancelled.load(Ordering::SeqCst),
            |_| {
                if calls.fetch_add(1, Ordering::SeqCst) == 4 {
                    cancelled.store(true, Ordering::SeqCst);
                }
                async { Err("down") }
            },
        )
        .await;

        assert_eq!(outcome, RetryOutcome::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_no_attempt_is_made_twice_after_success() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<&str, &str> =
            retry_until(&RetryPolicy::unbounded(DELAY), || true, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("sent") }
            })
            .await;
        assert_eq!(outcome, RetryOutcome::Done("sent"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
