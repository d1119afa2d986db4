//! Builder methods for creating errors with context

use super::types::Error;
use std::path::PathBuf;

impl Error {
    /// Create an invalid spec error
    #[must_use]
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Error::InvalidSpec {
            message: message.into(),
        }
    }

    /// Create a cache consistency error
    #[must_use]
    pub fn cache_consistency(fingerprint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CacheConsistency {
            fingerprint: fingerprint.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a job not found error
    #[must_use]
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Error::JobNotFound {
            job_id: job_id.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a network error
    #[must_use]
    pub fn network(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Network {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}
