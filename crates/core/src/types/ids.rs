//! Newtype wrappers for identifiers

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Write as _};
use std::ops::Deref;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of a task within one job's graph
///
/// Ids are stable across jobs for the same story shape (`outline`,
/// `page-3-text`, `page-3-image`, `cover`), which keeps logs readable and
/// lets a retried job line up with the one it replaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a TaskId, rejecting empty names
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::configuration("task id cannot be empty"));
        }
        Ok(Self(id))
    }

    pub fn outline() -> Self {
        Self("outline".to_string())
    }

    pub fn cover() -> Self {
        Self("cover".to_string())
    }

    pub fn page_text(page: u32) -> Self {
        Self(format!("page-{page}-text"))
    }

    pub fn page_image(page: u32) -> Self {
        Self(format!("page-{page}-image"))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Deref for TaskId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for TaskId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Deterministic content hash of a task's semantic inputs (lowercase hex SHA-256)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap a hex digest, validating its shape
    pub fn from_hex(digest: impl Into<String>) -> Result<Self> {
        let digest = digest.into();
        if digest.len() != 64 || !digest.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(Error::configuration(format!(
                "fingerprint must be 64 lowercase hex characters, got '{digest}'"
            )));
        }
        Ok(Self(digest))
    }

    /// Encode a raw SHA-256 digest
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        let hex = digest.iter().fold(String::with_capacity(64), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        });
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Handle for one end-to-end story generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::job_not_found(format!("{s} ({e})")))
    }
}
