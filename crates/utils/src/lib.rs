//! Shared utilities for taleweave
//!
//! Everything here is independent of story semantics: timing, retry policy,
//! rate limiting and logging setup. The scheduler composes these.

pub mod clock;
pub mod logging;
pub mod resilience;

pub use clock::{Clock, TokioClock};
pub use resilience::{
    classify, FixedJitter, JitterSource, RandomJitter, RateLimiter, RetryConfig, RetryController,
    RetryDecision, RetryPhase, RetryState,
};
