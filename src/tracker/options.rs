//! Polling policy for a single delivery wait

use crate::status::DeliveryStatus;

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default spacing between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// Default upper bound on a single wait
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(600);
/// Consecutive query failures tolerated before giving up
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;
/// Default jitter as a fraction of the poll interval
pub const DEFAULT_JITTER: f64 = 0.1;

/// Predicate deciding whether to stop waiting on a pending observation
pub type EarlyExit = Arc<dyn Fn(&DeliveryStatus) -> bool + Send + Sync>;

/// Options for `DeliveryTracker::await_delivery`
#[derive(Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// Interval used once `slow_after_polls` polls have been made
    pub slow_poll_interval: Option<Duration>,
    pub slow_after_polls: u32,
    pub max_wait: Duration,
    pub max_consecutive_errors: u32,
    /// Extra delay of up to `jitter * interval`, drawn per sleep; always in `[0, 1]`
    jitter: f64,
    /// Delay before the first query
    pub initial_delay: Duration,
    early_exit: Option<EarlyExit>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            slow_poll_interval: None,
            slow_after_polls: 0,
            max_wait: DEFAULT_MAX_WAIT,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            jitter: DEFAULT_JITTER,
            initial_delay: Duration::ZERO,
            early_exit: None,
        }
    }
}

impl WaitOptions {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Switch to `interval` after `after_polls` polls
    pub fn with_slow_down(mut self, after_polls: u32, interval: Duration) -> Self {
        self.slow_after_polls = after_polls;
        self.slow_poll_interval = Some(interval);
        self
    }

    pub fn with_max_consecutive_errors(mut self, max: u32) -> Self {
        self.max_consecutive_errors = max;
        self
    }

    /// Set the jitter fraction; clamped to `[0, 1]`, non-finite values disable jitter
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Stop waiting as soon as `predicate` holds for a pending observation
    pub fn with_early_exit<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&DeliveryStatus) -> bool + Send + Sync + 'static,
    {
        self.early_exit = Some(Arc::new(predicate));
        self
    }

    /// Base interval to sleep after `polls` polls have been made
    pub fn interval_for(&self, polls: u32) -> Duration {
        match self.slow_poll_interval {
            Some(slow) if polls >= self.slow_after_polls => slow,
            _ => self.poll_interval,
        }
    }

    /// Error budget, never below one
    pub fn error_budget(&self) -> u32 {
        self.max_consecutive_errors.max(1)
    }

    pub(crate) fn jittered(&self, base: Duration) -> Duration {
        if self.jitter <= 0.0 || !self.jitter.is_finite() || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(0.0..=self.jitter.min(1.0));
        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .ok()
            .and_then(|extra| base.checked_add(extra))
            .unwrap_or(base)
    }

    pub(crate) fn should_exit_early(&self, status: &DeliveryStatus) -> bool {
        self.early_exit
            .as_ref()
            .map(|predicate| predicate(status))
            .unwrap_or(false)
    }
}

impl fmt::Debug for WaitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitOptions")
            .field("poll_interval", &self.poll_interval)
            .field("slow_poll_interval", &self.slow_poll_interval)
            .field("slow_after_polls", &self.slow_after_polls)
            .field("max_wait", &self.max_wait)
            .field("max_consecutive_errors", &self.max_consecutive_errors)
            .field("jitter", &self.jitter)
            .field("initial_delay", &self.initial_delay)
            .field("early_exit", &self.early_exit.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slow_down_after_polls() {
        let options = WaitOptions::default()
            .with_poll_interval(Duration::from_secs(15))
            .with_slow_down(5, Duration::from_secs(60));

        assert_eq!(options.interval_for(1), Duration::from_secs(15));
        assert_eq!(options.interval_for(4), Duration::from_secs(15));
        assert_eq!(options.interval_for(5), Duration::from_secs(60));
        assert_eq!(options.interval_for(12), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_is_additive_and_bounded() {
        let options = WaitOptions::default().with_jitter(0.5);
        let base = Duration::from_secs(2);

        for _ in 0..100 {
            let d = options.jittered(base);
            assert!(d >= base);
            assert!(d <= Duration::from_secs(3));
        }
        assert_eq!(WaitOptions::default().with_jitter(0.0).jittered(base), base);
        assert_eq!(WaitOptions::default().with_jitter(7.0).jitter(), 1.0);
        assert_eq!(WaitOptions::default().with_jitter(-0.5).jitter(), 0.0);
    }

    #[test]
    fn test_non_finite_jitter_is_disabled() {
        let base = Duration::from_secs(2);

        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let options = WaitOptions::default().with_jitter(jitter);
            assert_eq!(options.jitter(), 0.0);
            assert_eq!(options.jittered(base), base);
        }
    }

    #[test]
    fn test_jitter_on_huge_interval_does_not_overflow() {
        let options = WaitOptions::default().with_jitter(1.0);
        let base = Duration::MAX - Duration::from_secs(1);

        for _ in 0..20 {
            assert!(options.jittered(base) >= base);
        }
    }

    #[test]
    fn test_error_budget_floor() {
        assert_eq!(
            WaitOptions::default()
                .with_max_consecutive_errors(0)
                .error_budget(),
            1
        );
        assert_eq!(WaitOptions::default().error_budget(), 3);
    }

    #[test]
    fn test_early_exit_predicate() {
        let options = WaitOptions::default()
            .with_early_exit(|status| status.stage() == Some("Receiver Failure pending"));

        assert!(!options.should_exit_early(&DeliveryStatus::pending()));
        assert!(options.should_exit_early(&DeliveryStatus::pending_at("Receiver Failure pending")));
        assert!(!WaitOptions::default().should_exit_early(&DeliveryStatus::pending()));
        assert!(format!("{:?}", options).contains("early_exit: true"));
    }
}
