//! Bounded retry loop for optional registrations.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::resilience::backoff::{linear_backoff, Sleeper};

/// Attempt budget and backoff step for a retried registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl RetryPolicy {
    pub const fn linear(max_attempts: u32, step: Duration) -> Self {
        Self { max_attempts, step }
    }

    /// Delay slept after the given failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        linear_backoff(attempt, self.step)
    }
}

/// How a bounded retry loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Succeeded on the given 1-based attempt.
    Succeeded { attempt: u32 },
    /// Every attempt failed.
    Exhausted { attempts: u32 },
}

/// Run `attempt` up to `policy.max_attempts` times.
///
/// Each failure is logged at warn level with the attempt number, then the
/// task sleeps `step * attempt` (including after the final failure) before
/// trying again or giving up.
pub async fn retry_bounded<F, Fut, E>(
    label: &str,
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut attempt: F,
) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    for n in 1..=policy.max_attempts {
        match attempt(n).await {
            Ok(()) => return RetryOutcome::Succeeded { attempt: n },
            Err(e) => {
                tracing::warn!(retry = n, error = %e, "failed to initialize {}", label);
            }
        }

        let delay = policy.delay_after(n);
        tracing::debug!(retry = n, delay = ?delay, "sleeping to retry initializing {}", label);
        sleeper.sleep(delay).await;
    }

    RetryOutcome::Exhausted {
        attempts: policy.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    #[tokio::test]
    async fn test_exhausts_budget_with_linear_backoff() {
        let sleeper = RecordingSleeper::default();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::linear(3, Duration::from_secs(20));

        let outcome = retry_bounded("exporter", policy, &sleeper, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("collector unavailable") }
        })
        .await;

        assert_eq!(outcome, RetryOutcome::Exhausted { attempts: 3 });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.slept.lock().unwrap(),
            vec![
                Duration::from_secs(20),
                Duration::from_secs(40),
                Duration::from_secs(60)
            ]
        );
    }

    #[tokio::test]
    async fn test_stops_on_first_success() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::linear(3, Duration::from_secs(10));

        let outcome = retry_bounded("profiler", policy, &sleeper, |n| async move {
            if n < 2 {
                Err("not yet")
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(outcome, RetryOutcome::Succeeded { attempt: 2 });
        assert_eq!(*sleeper.slept.lock().unwrap(), vec![Duration::from_secs(10)]);
    }
}
