use std::time::Duration;

/// Reconnection delay policy for the push stream.
///
/// Attempt `n` (starting at 0) waits `base_delay * 2^n`, capped at
/// `max_delay`. Once `max_attempts` retries have been scheduled no further
/// automatic attempt is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 6,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry `attempt + 1`, or `None` once the ceiling is reached.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(delay.min(self.max_delay))
    }
}
