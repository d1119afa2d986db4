//! Injectable time source
//!
//! Retry backoff, rate limiting, provider timeouts and the job time budget
//! all wait on the context's clock, so tests can substitute their own.
//! `TokioClock` follows tokio's paused time in
//! `#[tokio::test(start_paused = true)]`, which covers most test needs.

use async_trait::async_trait;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::Instant;

/// Source of "now" and of delays
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
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
        assert!(clock.now() - start >= Duration::from_secs(30));
    }
}
