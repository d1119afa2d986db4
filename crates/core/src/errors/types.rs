//! Core error type definitions

use std::path::PathBuf;

/// Result type alias for taleweave operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for taleweave operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The story specification cannot be planned
    #[error("invalid story spec: {message}")]
    InvalidSpec { message: String },

    /// Two different artifacts were offered for the same fingerprint
    #[error("cache consistency violation for fingerprint {fingerprint}: {message}")]
    CacheConsistency { fingerprint: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Unknown job handle
    #[error("job '{job_id}' not found")]
    JobNotFound { job_id: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// File system operations
    #[error("file system {operation} operation failed for '{}': {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// Network-related errors
    #[error("network error talking to '{endpoint}': {message}")]
    Network { endpoint: String, message: String },
}
