//! Retry policy and shared retry state

use crate::config::TransportConfig;
use std::time::Duration;

/// Backoff parameters for rate-limited responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Added to the delay for every further consecutive retry
    pub backoff: Duration,

    /// Rate-limited attempts after which the transport gives up
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(initial_delay: Duration, backoff: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            backoff,
            max_attempts,
        }
    }

    /// Delay to wait after `attempt` consecutive rate-limited responses
    ///
    /// `initial_delay + backoff * attempt`, non-decreasing in `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_add(self.backoff.saturating_mul(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(6), Duration::from_secs(5), 5)
    }
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.backoff_ms),
            config.max_attempts,
        )
    }
}

/// Throttle counter shared by every caller of one transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempt_count: u32,
    last_delay: Duration,
}

impl RetryState {
    /// Consecutive rate-limited responses since the last other outcome
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// The most recent backoff delay
    pub fn last_delay(&self) -> Duration {
        self.last_delay
    }

    /// Records a rate-limited response and returns the delay to wait
    pub(crate) fn register_throttle(&mut self, policy: &RetryPolicy) -> Duration {
        let delay = policy.delay_for(self.attempt_count);
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_delay = delay;
        delay
    }

    pub(crate) fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt_count >= policy.max_attempts
    }

    pub(crate) fn reset(&mut self) {
        self.attempt_count = 0;
    }
}
