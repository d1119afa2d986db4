//! Retry/backoff controller
//!
//! The controller owns no timers. It tracks each task's attempts in a
//! `RetryState` and answers "what next?" after every failure; the caller
//! decides how to wait. That keeps the decision logic testable without sleeping.

use super::classify::classify;
use super::config::RetryConfig;
use super::jitter::{JitterSource, RandomJitter};
use std::sync::Arc;
use std::time::Duration;
use taleweave_core::{ErrorClass, ProviderError};

/// Where a task is in its retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    /// Waiting for its first attempt
    Scheduled,
    /// An attempt is outstanding
    Attempted,
    /// The last attempt failed and was classified
    Classified(ErrorClass),
    /// A further attempt has been scheduled after a backoff
    Retried,
    /// No further attempts will be made
    Terminal,
}

/// Per-task retry bookkeeping
#[derive(Debug, Clone)]
pub struct RetryState {
    phase: RetryPhase,
    attempts: u32,
    last_error: Option<ProviderError>,
}

impl RetryState {
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&ProviderError> {
        self.last_error.as_ref()
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self {
            phase: RetryPhase::Scheduled,
            attempts: 0,
            last_error: None,
        }
    }
}

/// Verdict after a failed attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Try again after `delay`
    Retry {
        next_attempt: u32,
        delay: Duration,
        class: ErrorClass,
    },
    /// Give up; `error` is the last one seen
    Terminal {
        class: ErrorClass,
        attempts: u32,
        error: ProviderError,
    },
}

/// Classifies failures and decides whether to retry them
#[derive(Debug, Clone)]
pub struct RetryController {
    config: RetryConfig,
    jitter: Arc<dyn JitterSource>,
}

impl RetryController {
    pub fn new(config: RetryConfig) -> Self {
        Self::with_jitter(config, Arc::new(RandomJitter))
    }

    pub fn with_jitter(config: RetryConfig, jitter: Arc<dyn JitterSource>) -> Self {
        Self { config, jitter }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Fresh state for a newly scheduled task
    pub fn begin(&self) -> RetryState {
        RetryState::default()
    }

    /// Record that an attempt is starting and return its 1-based number
    pub fn record_attempt(&self, state: &mut RetryState) -> u32 {
        state.attempts += 1;
        state.phase = RetryPhase::Attempted;
        state.attempts
    }

    /// Classify a failed attempt and decide what happens next
    pub fn on_failure(&self, state: &mut RetryState, error: ProviderError) -> RetryDecision {
        let class = classify(&error);
        state.phase = RetryPhase::Classified(class);

        let exhausted = state.attempts >= self.config.max_attempts;
        if !class.is_retryable() || exhausted {
            state.phase = RetryPhase::Terminal;
            state.last_error = Some(error.clone());
            tracing::debug!(
                attempts = state.attempts,
                class = ?class,
                exhausted,
                "retry_terminal"
            );
            return RetryDecision::Terminal {
                class,
                attempts: state.attempts,
                error,
            };
        }

        let delay = self.delay_for(state.attempts, class, &error);
        state.phase = RetryPhase::Retried;
        state.last_error = Some(error);
        RetryDecision::Retry {
            next_attempt: state.attempts + 1,
            delay,
            class,
        }
    }

    /// Backoff before the attempt after `attempts_made`
    ///
    /// A rate-limited response that names its own delay is honoured, capped at
    /// the configured maximum.
    pub fn delay_for(&self, attempts_made: u32, class: ErrorClass, error: &ProviderError) -> Duration {
        if class == ErrorClass::RateLimited {
            if let Some(after) = error.retry_after {
                return after.min(self.config.max_delay);
            }
        }
        let retry_index = attempts_made.saturating_sub(1);
        self.config
            .calculate_delay(retry_index, self.jitter.sample())
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
