//! Linear backoff and the sleep abstraction used by retry loops.

use std::time::Duration;

use async_trait::async_trait;

/// Delay after the given 1-based attempt: `step * attempt`.
pub fn linear_backoff(attempt: u32, step: Duration) -> Duration {
    step.saturating_mul(attempt)
}

/// Suspends the calling task. Only the retrying task is ever blocked.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let step = Duration::from_secs(20);
        assert_eq!(linear_backoff(1, step), Duration::from_secs(20));
        assert_eq!(linear_backoff(2, step), Duration::from_secs(40));
        assert_eq!(linear_backoff(3, step), Duration::from_secs(60));
        assert_eq!(linear_backoff(0, step), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_advances_paused_clock() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(10)).await;
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
