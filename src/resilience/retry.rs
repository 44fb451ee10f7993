use tokio::time::Duration;

/// Attempt cap for a token generation sequence (initial call included).
pub const MAX_RETRY_ATTEMPTS: u32 = 3;
pub const BASE_DELAY_MS: u64 = 1000;

/// Exponential backoff schedule: after the n-th consecutive failure
/// the next attempt waits `2^n * base_delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            base_delay_ms: BASE_DELAY_MS,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self { max_attempts, base_delay_ms }
    }

    /// Delay before the attempt that follows `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 2u64.checked_pow(failures).unwrap_or(u64::MAX);
        Duration::from_millis(factor.saturating_mul(self.base_delay_ms))
    }

    pub fn is_exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}
