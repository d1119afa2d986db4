//! Configuration loader for taleweave
//!
//! Layers are applied in order: built-in defaults, then an optional JSON
//! file, then `TALEWEAVE_*` environment variables. The merged result is
//! validated before it is returned.

use crate::config::OrchestratorConfig;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use taleweave_core::{Error, Result};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "TALEWEAVE_";

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Builder that assembles an `OrchestratorConfig` from its sources
pub struct ConfigLoader {
    /// Optional JSON file to read
    file: Option<PathBuf>,
    /// Whether environment overrides are applied
    use_env: bool,
    lookup: EnvLookup,
}

impl ConfigLoader {
    /// Create a new configuration loader reading the process environment
    pub fn new() -> Self {
        Self {
            file: None,
            use_env: true,
            lookup: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Read settings from a JSON file
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Replace the environment lookup, mostly for tests
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Box::new(lookup);
        self
    }

    /// Skip environment overrides entirely
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Load and validate the configuration
    pub fn load(self) -> Result<OrchestratorConfig> {
        let mut config = match &self.file {
            Some(path) => read_file(path)?,
            None => OrchestratorConfig::default(),
        };

        if self.use_env {
            self.apply_env(&mut config)?;
        }

        config.validate()?;
        tracing::debug!(
            file = ?self.file,
            global = config.concurrency.global,
            text = config.concurrency.text,
            image = config.concurrency.image,
            "configuration loaded"
        );
        Ok(config)
    }

    fn apply_env(&self, config: &mut OrchestratorConfig) -> Result<()> {
        if let Some(v) = self.parse("CONCURRENCY_GLOBAL")? {
            config.concurrency.global = v;
        }
        if let Some(v) = self.parse("CONCURRENCY_TEXT")? {
            config.concurrency.text = v;
        }
        if let Some(v) = self.parse("CONCURRENCY_IMAGE")? {
            config.concurrency.image = v;
        }
        if let Some(v) = self.parse("MAX_ATTEMPTS")? {
            config.retry.max_attempts = v;
        }
        if let Some(v) = self.parse("BASE_DELAY_MS")? {
            config.retry.base_delay_ms = v;
        }
        if let Some(v) = self.parse("MAX_DELAY_MS")? {
            config.retry.max_delay_ms = v;
        }
        if let Some(v) = self.parse("JITTER_FACTOR")? {
            config.retry.jitter_factor = v;
        }
        if let Some(v) = self.parse("CACHE_MAX_ENTRIES")? {
            config.cache.max_entries = v;
        }
        if let Some(v) = self.parse("CACHE_MAX_BYTES")? {
            config.cache.max_bytes = v;
        }
        if let Some(v) = self.parse("CACHE_TTL_SECS")? {
            config.cache.ttl_secs = Some(v);
        }
        if let Some(v) = self.parse("PROVIDER_TIMEOUT_MS")? {
            config.provider_timeout_ms = v;
        }
        if let Some(v) = self.parse("JOB_TIMEOUT_MS")? {
            config.job_timeout_ms = Some(v);
        }
        if let Some(v) = self.parse("TEXT_MIN_INTERVAL_MS")? {
            config.rate_limits.text_min_interval_ms = Some(v);
        }
        if let Some(v) = self.parse("IMAGE_MIN_INTERVAL_MS")? {
            config.rate_limits.image_min_interval_ms = Some(v);
        }
        if let Some(v) = self.parse("MAX_PAGES")? {
            config.max_pages = v;
        }
        if let Some(v) = self.var("TEXT_ENDPOINT") {
            config.providers.text_endpoint = Some(v);
        }
        if let Some(v) = self.var("IMAGE_ENDPOINT") {
            config.providers.image_endpoint = Some(v);
        }
        if let Some(v) = self.var("API_KEY_ENV") {
            config.providers.api_key_env = Some(v);
        }
        Ok(())
    }

    fn var(&self, name: &str) -> Option<String> {
        (self.lookup)(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.var(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                Error::configuration(format!(
                    "{ENV_PREFIX}{name} has an invalid value '{raw}'"
                ))
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_file(path: &Path) -> Result<OrchestratorConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::file_system(path, "read config", e))?;
    serde_json::from_str(&content).map_err(|e| {
        Error::configuration(format!(
            "failed to parse {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = ConfigLoader::new().without_env().load().unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "concurrency": {{ "global": 8, "image": 3 }}, "jobTimeoutMs": 60000 }}"#
        )
        .unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .without_env()
            .load()
            .unwrap();
        assert_eq!(config.concurrency.global, 8);
        assert_eq!(config.concurrency.image, 3);
        assert_eq!(config.concurrency.text, 2);
        assert_eq!(config.job_timeout_ms, Some(60_000));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "concurrency": {{ "image": 3 }} }}"#).unwrap();

        let config = ConfigLoader::new()
            .with_file(file.path())
            .with_env_lookup(env(&[
                ("TALEWEAVE_CONCURRENCY_IMAGE", "1"),
                ("TALEWEAVE_MAX_ATTEMPTS", "5"),
                ("TALEWEAVE_IMAGE_ENDPOINT", "http://localhost:9000/image"),
            ]))
            .load()
            .unwrap();
        assert_eq!(config.concurrency.image, 1);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.providers.image_endpoint.as_deref(),
            Some("http://localhost:9000/image")
        );
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let err = ConfigLoader::new()
            .with_env_lookup(env(&[("TALEWEAVE_CONCURRENCY_TEXT", "many")]))
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("TALEWEAVE_CONCURRENCY_TEXT"));
    }

    #[test]
    fn test_env_values_are_validated() {
        let err = ConfigLoader::new()
            .with_env_lookup(env(&[("TALEWEAVE_CONCURRENCY_GLOBAL", "0")]))
            .load()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_missing_file_is_a_file_system_error() {
        let err = ConfigLoader::new()
            .with_file("/definitely/not/here.json")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, Error::FileSystem { .. }));
    }

    #[test]
    fn test_malformed_file_is_a_configuration_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = ConfigLoader::new()
            .with_file(file.path())
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }
}
