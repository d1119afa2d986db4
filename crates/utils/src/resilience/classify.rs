//! Provider error classification

use taleweave_core::{ErrorClass, ProviderError};

/// Map a provider error onto the retry taxonomy
///
/// 429 is rate limiting, 408 a timeout, 451 (or an explicit content-policy
/// flag) a policy rejection, 5xx and transport failures transient, and any
/// other 4xx an invalid request.
pub fn classify(error: &ProviderError) -> ErrorClass {
    if error.content_policy {
        return ErrorClass::ContentPolicyRejection;
    }
    match error.status {
        429 => ErrorClass::RateLimited,
        408 => ErrorClass::Timeout,
        451 => ErrorClass::ContentPolicyRejection,
        400..=499 => ErrorClass::InvalidInput,
        _ => ErrorClass::TransientServer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            classify(&ProviderError::rate_limited(None)),
            ErrorClass::RateLimited
        );
        assert_eq!(
            classify(&ProviderError::timeout(Duration::from_secs(1))),
            ErrorClass::Timeout
        );
        assert_eq!(
            classify(&ProviderError::server(503, "overloaded")),
            ErrorClass::TransientServer
        );
        assert_eq!(
            classify(&ProviderError::invalid_input("bad prompt")),
            ErrorClass::InvalidInput
        );
        assert_eq!(
            classify(&ProviderError::new(404, "no such model")),
            ErrorClass::InvalidInput
        );
        assert_eq!(
            classify(&ProviderError::new(451, "blocked")),
            ErrorClass::ContentPolicyRejection
        );
        assert_eq!(
            classify(&ProviderError::transport("connection reset")),
            ErrorClass::TransientServer
        );
    }

    #[test]
    fn test_content_policy_flag_wins_over_status() {
        let error = ProviderError::content_policy("unsafe prompt");
        assert_eq!(error.status, 400);
        assert_eq!(classify(&error), ErrorClass::ContentPolicyRejection);
    }
}
