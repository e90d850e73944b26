//! Time source for the poll loop

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Clock driving the tracker's deadlines and sleeps.
///
/// Swapping it out lets tests run polling schedules without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Wall-clock time, used only to timestamp outcomes
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed clock; follows paused/advanced time in tokio tests
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock;
        let start = clock.now();

        clock.sleep(Duration::from_secs(30)).await;

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(30));
    }
}
