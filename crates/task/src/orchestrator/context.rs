//! Everything a job needs to run, bundled and owned by the caller

use crate::planner::RequestPlanner;
use crate::provider::ProviderRegistry;
use crate::scheduler::ConcurrencyLimits;
use std::fmt;
use std::sync::Arc;
use taleweave_cache::{CacheConfig, ContentCache};
use taleweave_config::OrchestratorConfig;
use taleweave_core::{Error, ProviderKind, Result};
use taleweave_utils::{Clock, JitterSource, RandomJitter, RateLimiter, RetryController, TokioClock};

/// Shared state for every job started from the same context
///
/// Jobs that share a context share its cache, so identical work across jobs
/// is done once, and they share its concurrency caps.
pub struct OrchestrationContext {
    config: OrchestratorConfig,
    cache: Arc<ContentCache>,
    providers: ProviderRegistry,
    clock: Arc<dyn Clock>,
    retry: RetryController,
    limits: Arc<ConcurrencyLimits>,
    text_rate: Option<RateLimiter>,
    image_rate: Option<RateLimiter>,
    planner: RequestPlanner,
}

impl OrchestrationContext {
    pub fn builder(providers: ProviderRegistry) -> OrchestrationContextBuilder {
        OrchestrationContextBuilder::new(providers)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn retry(&self) -> &RetryController {
        &self.retry
    }

    pub fn limits(&self) -> &Arc<ConcurrencyLimits> {
        &self.limits
    }

    pub fn planner(&self) -> &RequestPlanner {
        &self.planner
    }

    /// Spacing between call starts for `kind`, if configured
    pub fn rate_limiter(&self, kind: ProviderKind) -> Option<&RateLimiter> {
        match kind {
            ProviderKind::Text => self.text_rate.as_ref(),
            ProviderKind::Image => self.image_rate.as_ref(),
        }
    }
}

impl fmt::Debug for OrchestrationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationContext")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("providers", &self.providers)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Builder for [`OrchestrationContext`]
///
/// Anything not set falls back to the defaults: default configuration, a
/// fresh cache sized from the configuration, the tokio clock and random jitter.
pub struct OrchestrationContextBuilder {
    providers: ProviderRegistry,
    config: Option<OrchestratorConfig>,
    cache: Option<Arc<ContentCache>>,
    clock: Option<Arc<dyn Clock>>,
    jitter: Option<Arc<dyn JitterSource>>,
}

impl OrchestrationContextBuilder {
    fn new(providers: ProviderRegistry) -> Self {
        Self {
            providers,
            config: None,
            cache: None,
            clock: None,
            jitter: None,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use an existing cache, for example one shared with another context
    pub fn cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn build(self) -> Result<OrchestrationContext> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let cache = match self.cache {
            Some(cache) => cache,
            None => {
                let cache_config = CacheConfig {
                    max_entries: config.cache.max_entries,
                    max_bytes: config.cache.max_bytes,
                    ttl: config.cache.ttl_secs.map(std::time::Duration::from_secs),
                };
                Arc::new(ContentCache::new(cache_config).map_err(Error::from)?)
            }
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let jitter = self.jitter.unwrap_or_else(|| Arc::new(RandomJitter));
        let retry = RetryController::with_jitter(config.retry.to_retry_config(), jitter);
        let limits = Arc::new(ConcurrencyLimits::from_config(&config.concurrency));

        let rate_limiter = |kind: ProviderKind| {
            config
                .rate_limits
                .for_kind(kind)
                .map(|interval| RateLimiter::new(interval, Arc::clone(&clock)))
        };
        let text_rate = rate_limiter(ProviderKind::Text);
        let image_rate = rate_limiter(ProviderKind::Image);
        let planner = RequestPlanner::new(config.max_pages);

        tracing::debug!(
            global = config.concurrency.global,
            text = config.concurrency.text,
            image = config.concurrency.image,
            max_attempts = config.retry.max_attempts,
            "orchestration context ready"
        );

        Ok(OrchestrationContext {
            config,
            cache,
            providers: self.providers,
            clock,
            retry,
            limits,
            text_rate,
            image_rate,
            planner,
        })
    }
}
