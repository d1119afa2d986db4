//! Cache error types

use taleweave_core::{Error, Fingerprint};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A fingerprint was written twice with different content
    ///
    /// Either the hash collided or an upstream provider is not deterministic
    /// for identical inputs. The original entry is kept.
    #[error(
        "cache consistency violation for {fingerprint}: stored artifact ({existing_bytes} bytes) differs from new artifact ({incoming_bytes} bytes)"
    )]
    ConsistencyViolation {
        fingerprint: Fingerprint,
        existing_bytes: u64,
        incoming_bytes: u64,
    },

    #[error("invalid cache configuration: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CacheError::Configuration {
            message: message.into(),
        }
    }
}

impl From<CacheError> for Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::ConsistencyViolation { ref fingerprint, .. } => {
                Error::cache_consistency(fingerprint.as_str(), err.to_string())
            }
            CacheError::Configuration { message } => Error::configuration(message),
        }
    }
}
