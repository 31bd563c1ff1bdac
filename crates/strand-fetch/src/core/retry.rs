use std::time::Duration;

use crate::data::RetryConfig;

/// Fixed-cadence retry schedule for chunk fetches.
///
/// Every failed attempt waits the same `interval` before the next one; there
/// is no backoff and no jitter. After `max_attempts` attempts the chunk is
/// given up on.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use strand_fetch::RetryPolicy;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(60));
/// assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(2), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(3), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
    request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.interval(), config.request_timeout())
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration, request_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            request_timeout,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on a single request, chosen long enough that a large chunk
    /// over a slow link is not cut off.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Delay before the attempt following `attempt` (1-based), or `None` once
    /// the budget is spent.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then_some(self.interval)
    }
}
