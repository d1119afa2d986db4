//! Resilience patterns for calls to external providers.
//!
//! ## Key Components
//!
//! - **`classify`**: maps a `ProviderError` onto the retry taxonomy.
//! - **`retry`**: the retry/backoff controller, an explicit state machine
//!   (scheduled, attempted, classified, then retried or terminal).
//! - **`rate_limit`**: spaces out call starts for one provider.

pub mod classify;
pub mod config;
pub mod jitter;
pub mod rate_limit;
pub mod retry;

pub use classify::classify;
pub use config::RetryConfig;
pub use jitter::{FixedJitter, JitterSource, RandomJitter};
pub use rate_limit::RateLimiter;
pub use retry::{RetryController, RetryDecision, RetryPhase, RetryState};
