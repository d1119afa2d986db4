//! Configuration model and validation

use serde::{Deserialize, Serialize};
use std::time::Duration;
use taleweave_core::{Error, ProviderKind, Result};
use taleweave_utils::RetryConfig;

/// Top-level orchestrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorConfig {
    pub concurrency: ConcurrencyConfig,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    /// Hard timeout for a single provider call
    pub provider_timeout_ms: u64,
    /// Global time budget for a job; unset means unbounded
    pub job_timeout_ms: Option<u64>,
    pub rate_limits: RateLimitSettings,
    /// Largest page count the planner accepts
    pub max_pages: u32,
    pub providers: ProviderEndpoints,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyConfig::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            provider_timeout_ms: 120_000,
            job_timeout_ms: None,
            rate_limits: RateLimitSettings::default(),
            max_pages: 64,
            providers: ProviderEndpoints::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_ms.map(Duration::from_millis)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        let c = &self.concurrency;
        if c.global == 0 || c.text == 0 || c.image == 0 {
            return Err(Error::configuration(
                "concurrency caps must be at least 1 (global, text, image)",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::configuration("retry.maxAttempts must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(Error::configuration(format!(
                "retry.jitterFactor must be within [0, 1], got {}",
                self.retry.jitter_factor
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::configuration(
                "retry.baseDelayMs cannot exceed retry.maxDelayMs",
            ));
        }
        if self.cache.max_entries == 0 || self.cache.max_bytes == 0 {
            return Err(Error::configuration(
                "cache.maxEntries and cache.maxBytes must be positive",
            ));
        }
        if self.provider_timeout_ms == 0 {
            return Err(Error::configuration("providerTimeoutMs must be positive"));
        }
        if self.max_pages == 0 {
            return Err(Error::configuration("maxPages must be positive"));
        }
        Ok(())
    }
}

/// Concurrency caps; per-kind caps apply independently of each other
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConcurrencyConfig {
    pub global: usize,
    pub text: usize,
    pub image: usize,
}

impl ConcurrencyConfig {
    pub fn for_kind(&self, kind: ProviderKind) -> usize {
        match kind {
            ProviderKind::Text => self.text,
            ProviderKind::Image => self.image,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            global: 4,
            text: 2,
            image: 2,
        }
    }
}

/// Retry settings as written in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            base_delay_ms: defaults.base_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            jitter_factor: defaults.jitter_factor,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_factor: self.jitter_factor,
        }
    }
}

/// Cache capacity and expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub max_bytes: u64,
    pub ttl_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_bytes: 256 * 1024 * 1024,
            ttl_secs: None,
        }
    }
}

/// Minimum spacing between call starts, per provider kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitSettings {
    pub text_min_interval_ms: Option<u64>,
    pub image_min_interval_ms: Option<u64>,
}

impl RateLimitSettings {
    pub fn for_kind(&self, kind: ProviderKind) -> Option<Duration> {
        let ms = match kind {
            ProviderKind::Text => self.text_min_interval_ms,
            ProviderKind::Image => self.image_min_interval_ms,
        };
        ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

/// HTTP endpoints for the provider adapters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderEndpoints {
    pub text_endpoint: Option<String>,
    pub image_endpoint: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
}
