//! Provider failures and the user-facing failure taxonomy

use super::ids::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Status used for failures that never produced an HTTP response
pub const TRANSPORT_FAILURE_STATUS: u16 = 0;

/// Error returned by a provider adapter
///
/// `status` is HTTP-like so that every adapter maps onto the same taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("status {status}: {message}")]
pub struct ProviderError {
    pub status: u16,
    pub message: String,
    /// Provider-specified delay before the next attempt
    pub retry_after: Option<Duration>,
    /// Set when the provider refused the content rather than the request shape
    pub content_policy: bool,
}

impl ProviderError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
            content_policy: false,
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self {
            retry_after,
            ..Self::new(429, "rate limited")
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(408, format!("no response within {after:?}"))
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn content_policy(message: impl Into<String>) -> Self {
        Self {
            content_policy: true,
            ..Self::new(400, message)
        }
    }

    /// Connection-level failure with no response status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(TRANSPORT_FAILURE_STATUS, message)
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Classification of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorClass {
    RateLimited,
    Timeout,
    TransientServer,
    InvalidInput,
    ContentPolicyRejection,
}

impl ErrorClass {
    /// Whether another attempt can succeed without changing the request
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorClass::RateLimited | ErrorClass::Timeout | ErrorClass::TransientServer
        )
    }
}

/// Why a task ended up failed, phrased for the caller rather than the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum FailureReason {
    RateLimited,
    Timeout,
    ProviderUnavailable,
    InvalidInput,
    ContentPolicy,
    CacheConsistency,
    #[serde(rename_all = "camelCase")]
    DependencyFailed { upstream: TaskId },
    BudgetExhausted,
    Stalled,
}

impl FailureReason {
    pub fn category(&self) -> &'static str {
        match self {
            FailureReason::RateLimited => "rateLimited",
            FailureReason::Timeout => "timeout",
            FailureReason::ProviderUnavailable => "providerUnavailable",
            FailureReason::InvalidInput => "invalidInput",
            FailureReason::ContentPolicy => "contentPolicy",
            FailureReason::CacheConsistency => "cacheConsistency",
            FailureReason::DependencyFailed { .. } => "dependencyFailed",
            FailureReason::BudgetExhausted => "budgetExhausted",
            FailureReason::Stalled => "stalled",
        }
    }

    /// Whether resubmitting the same input may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FailureReason::InvalidInput
                | FailureReason::ContentPolicy
                | FailureReason::CacheConsistency
        )
    }
}

impl From<ErrorClass> for FailureReason {
    fn from(class: ErrorClass) -> Self {
        match class {
            ErrorClass::RateLimited => FailureReason::RateLimited,
            ErrorClass::Timeout => FailureReason::Timeout,
            ErrorClass::TransientServer => FailureReason::ProviderUnavailable,
            ErrorClass::InvalidInput => FailureReason::InvalidInput,
            ErrorClass::ContentPolicyRejection => FailureReason::ContentPolicy,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::RateLimited => {
                write!(f, "the image or text service is busy, try again shortly")
            }
            FailureReason::Timeout => write!(f, "the service took too long to respond"),
            FailureReason::ProviderUnavailable => {
                write!(f, "the service is temporarily unavailable")
            }
            FailureReason::InvalidInput => write!(f, "the request could not be processed"),
            FailureReason::ContentPolicy => write!(
                f,
                "the content was rejected by the provider, try a different description or photo"
            ),
            FailureReason::CacheConsistency => {
                write!(f, "a stored result did not match a fresh one")
            }
            FailureReason::DependencyFailed { upstream } => {
                write!(f, "an earlier step ({upstream}) failed")
            }
            FailureReason::BudgetExhausted => write!(f, "the story ran out of time"),
            FailureReason::Stalled => write!(f, "the step could not be scheduled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(ErrorClass::RateLimited.is_retryable());
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(ErrorClass::TransientServer.is_retryable());
        assert!(!ErrorClass::InvalidInput.is_retryable());
        assert!(!ErrorClass::ContentPolicyRejection.is_retryable());
    }

    #[test]
    fn test_content_policy_reason_is_distinct() {
        let reason = FailureReason::from(ErrorClass::ContentPolicyRejection);
        assert_eq!(reason.category(), "contentPolicy");
        assert!(!reason.is_retryable());
        assert!(reason.to_string().contains("different"));
    }

    #[test]
    fn test_dependency_reason_serializes_upstream() {
        let reason = FailureReason::DependencyFailed {
            upstream: TaskId::outline(),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["category"], "dependencyFailed");
        assert_eq!(json["upstream"], "outline");
    }
}
