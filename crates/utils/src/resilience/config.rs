//! Retry configuration

use std::time::Duration;

/// Default maximum number of attempts per task, first attempt included
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default maximum delay for exponential backoff
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default jitter factor (0.2 = up to 20% added on top of the delay)
const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Backoff before the next attempt, without jitter
    ///
    /// `retry_index` is 0 for the first retry.
    pub fn base_backoff(&self, retry_index: u32) -> Duration {
        let factor = 2u32.checked_pow(retry_index).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff with jitter; `sample` is in [0, 1]
    pub fn calculate_delay(&self, retry_index: u32, sample: f64) -> Duration {
        let capped = self.base_backoff(retry_index);
        let jitter = capped.mul_f64(self.jitter_factor.clamp(0.0, 1.0) * sample.clamp(0.0, 1.0));
        capped + jitter
    }
}
