//! Per-provider call spacing
//!
//! Concurrency caps bound how many calls are outstanding; this bounds how
//! often new ones start. Each acquisition reserves the next free start slot,
//! so concurrent callers queue up one interval apart.

use crate::clock::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum-interval rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
            clock,
        }
    }

    /// Build from a requests-per-minute budget
    pub fn per_minute(requests: u32, clock: Arc<dyn Clock>) -> Self {
        let interval = Duration::from_secs(60) / requests.max(1);
        Self::new(interval, clock)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until this caller may start its call
    pub async fn acquire(&self) {
        let wait = {
            let mut next = self.next_slot.lock();
            let now = self.clock.now();
            let start = match *next {
                Some(slot) if slot > now => slot,
                _ => now,
            };
            *next = Some(start + self.min_interval);
            start - now
        };

        if !wait.is_zero() {
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate_limit_wait");
            self.clock.sleep(wait).await;
        }
    }
}
