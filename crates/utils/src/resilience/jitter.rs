//! Jitter sources for backoff delays

use rand::Rng;
use std::fmt::Debug;

/// Produces samples in [0, 1] used to spread retries out
pub trait JitterSource: Send + Sync + Debug {
    fn sample(&self) -> f64;
}

/// Uniform random jitter from the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen_range(0.0..=1.0)
    }
}

/// Constant jitter, for deterministic tests and dry runs
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0.clamp(0.0, 1.0)
    }
}
