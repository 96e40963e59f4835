//! Engine error classification
//!
//! Decides whether a downstream failure is worth retrying and which
//! user-facing category it falls into once retries are exhausted.

use crate::utils::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Codes that will fail the same way however often they are retried
const NON_RETRYABLE_CODES: [&str; 5] = [
    "ValidationException",
    "AccessDeniedException",
    "UnauthorizedException",
    "InvalidParameterException",
    "ContentPolicyViolation",
];

/// User-facing failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    RateLimit,
    ServiceUnavailable,
    ContentPolicy,
    QuotaExceeded,
    Unknown,
}

impl ErrorCategory {
    /// Fixed, non-technical message shown to the end user
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "I'm currently at capacity. Please try again in a moment.",
            ErrorCategory::ServiceUnavailable => "I'm temporarily unavailable. Please try again shortly.",
            ErrorCategory::ContentPolicy => "I can't process that request. Please try rephrasing your question.",
            ErrorCategory::QuotaExceeded => "Service is temporarily at capacity. Please try again later.",
            ErrorCategory::Unknown => "I encountered an error processing your request. Please try again.",
        }
    }

    /// Stable tag used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::ServiceUnavailable => "service_unavailable",
            ErrorCategory::ContentPolicy => "content_policy",
            ErrorCategory::QuotaExceeded => "quota_exceeded",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn mentions_quota(message: &str) -> bool {
    message.contains("quota") || message.contains("limit exceeded")
}

/// Whether retrying `error` is pointless.
///
/// Quota messages count as terminal: the caller has to wait for an
/// external reset, an immediate retry cannot succeed.
pub fn is_non_retryable(error: &EngineError) -> bool {
    if mentions_quota(&error.message_lower()) {
        return true;
    }

    let code = error.code_str();
    NON_RETRYABLE_CODES.iter().any(|terminal| code.contains(terminal))
}

/// Map a failure to its user-facing category. First match wins.
pub fn classify(error: &EngineError) -> ErrorCategory {
    let code = error.code_str();
    let message = error.message_lower();

    if code.contains("Throttling") || message.contains("rate limit") {
        ErrorCategory::RateLimit
    } else if code.contains("ServiceUnavailable") || message.contains("service unavailable") {
        ErrorCategory::ServiceUnavailable
    } else if message.contains("content policy") || message.contains("safety") {
        ErrorCategory::ContentPolicy
    } else if mentions_quota(&message) {
        ErrorCategory::QuotaExceeded
    } else {
        ErrorCategory::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_codes() {
        for code in NON_RETRYABLE_CODES {
            assert!(is_non_retryable(&EngineError::with_code(code)), "{} should be terminal", code);
        }
        // substring match, as with prefixed exception names
        assert!(is_non_retryable(&EngineError::with_code("com.amazon#AccessDeniedException")));
    }

    #[test]
    fn test_quota_messages_are_non_retryable() {
        assert!(is_non_retryable(&EngineError::with_message("Service is over QUOTA")));
        assert!(is_non_retryable(&EngineError::with_message("Token Limit Exceeded for account")));
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(!is_non_retryable(&EngineError::with_code("ThrottlingException")));
        assert!(!is_non_retryable(&EngineError::with_code("ServiceUnavailableException")));
        assert!(!is_non_retryable(&EngineError::with_message("connection reset")));
        assert!(!is_non_retryable(&EngineError::default()));
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(classify(&EngineError::with_code("ThrottlingException")), ErrorCategory::RateLimit);
        assert_eq!(classify(&EngineError::with_message("Rate limit hit")), ErrorCategory::RateLimit);
        assert_eq!(
            classify(&EngineError::with_code("ServiceUnavailableException")),
            ErrorCategory::ServiceUnavailable
        );
        assert_eq!(
            classify(&EngineError::with_message("Service Unavailable right now")),
            ErrorCategory::ServiceUnavailable
        );
        assert_eq!(
            classify(&EngineError::with_message("blocked by content policy")),
            ErrorCategory::ContentPolicy
        );
        assert_eq!(classify(&EngineError::with_message("Safety filter tripped")), ErrorCategory::ContentPolicy);
        assert_eq!(classify(&EngineError::with_message("Service is over quota")), ErrorCategory::QuotaExceeded);
        assert_eq!(classify(&EngineError::with_message("monthly limit exceeded")), ErrorCategory::QuotaExceeded);
        assert_eq!(classify(&EngineError::with_message("socket hang up")), ErrorCategory::Unknown);
        assert_eq!(classify(&EngineError::default()), ErrorCategory::Unknown);

        // throttling code beats a quota message
        assert_eq!(
            classify(&EngineError::new("ThrottlingException", "quota exhausted")),
            ErrorCategory::RateLimit
        );
        // rate limit message beats content policy message
        assert_eq!(
            classify(&EngineError::with_message("rate limit applied by safety layer")),
            ErrorCategory::RateLimit
        );
    }

    #[test]
    fn test_code_match_is_case_sensitive() {
        assert_eq!(classify(&EngineError::with_code("throttlingexception")), ErrorCategory::Unknown);
    }

    #[test]
    fn test_user_messages_do_not_leak_terms() {
        let quota = ErrorCategory::QuotaExceeded.user_message().to_lowercase();
        assert!(!quota.contains("quota"));

        for category in [
            ErrorCategory::RateLimit,
            ErrorCategory::ServiceUnavailable,
            ErrorCategory::ContentPolicy,
            ErrorCategory::QuotaExceeded,
            ErrorCategory::Unknown,
        ] {
            let message = category.user_message().to_lowercase();
            assert!(!message.contains("exception"));
            assert!(!message.contains("throttl"));
        }
    }
}
