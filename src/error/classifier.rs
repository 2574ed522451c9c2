//! Failure classification.
//!
//! # Truth Table
//! ```text
//! Status 429                 → RateLimit / Medium
//! Status 401, 403            → Auth / High
//! Status 400, 413, 422       → InvalidRequest / Low
//! Status 408, 504            → Timeout / Medium
//! Other 5xx                  → Network / Medium
//! Connection                 → Network / Medium
//! Timeout                    → Timeout / Medium
//! CircuitOpen                → ProviderUnavailable / Low
//! RateLimited (local)        → RateLimit / Medium
//! Internal (adapter fault)   → Unknown / Critical
//! Other                      → keyword match on kind + message, else Unknown / Medium
//! ```

use crate::error::{ErrorCategory, ErrorSeverity, ProviderFailure};

/// Map a raw failure to its category and severity.
pub fn classify(failure: &ProviderFailure) -> (ErrorCategory, ErrorSeverity) {
    match failure {
        ProviderFailure::Status { status, message } => classify_status(*status, message),
        ProviderFailure::Connection(_) => (ErrorCategory::Network, ErrorSeverity::Medium),
        ProviderFailure::Timeout(_) => (ErrorCategory::Timeout, ErrorSeverity::Medium),
        ProviderFailure::CircuitOpen => (ErrorCategory::ProviderUnavailable, ErrorSeverity::Low),
        ProviderFailure::RateLimited => (ErrorCategory::RateLimit, ErrorSeverity::Medium),
        ProviderFailure::Internal(_) => (ErrorCategory::Unknown, ErrorSeverity::Critical),
        ProviderFailure::Other { kind, message } => {
            classify_message(&format!("{} {}", kind, message))
        }
    }
}

fn classify_status(status: u16, message: &str) -> (ErrorCategory, ErrorSeverity) {
    match status {
        429 => (ErrorCategory::RateLimit, ErrorSeverity::Medium),
        401 | 403 => (ErrorCategory::Auth, ErrorSeverity::High),
        400 | 413 | 422 => (ErrorCategory::InvalidRequest, ErrorSeverity::Low),
        408 | 504 => (ErrorCategory::Timeout, ErrorSeverity::Medium),
        500..=599 => (ErrorCategory::Network, ErrorSeverity::Medium),
        _ => classify_message(message),
    }
}

/// Keyword rules, checked in order. First match wins.
const KEYWORD_RULES: &[(&[&str], ErrorCategory, ErrorSeverity)] = &[
    (
        &["timeout", "timed out", "deadline"],
        ErrorCategory::Timeout,
        ErrorSeverity::Medium,
    ),
    (
        &["connection", "network", "unreachable", "refused", "dns"],
        ErrorCategory::Network,
        ErrorSeverity::Medium,
    ),
    (
        &["unauthorized", "authentication", "forbidden", "api key", "401", "403"],
        ErrorCategory::Auth,
        ErrorSeverity::High,
    ),
    (
        &["rate limit", "too many requests", "quota", "429"],
        ErrorCategory::RateLimit,
        ErrorSeverity::Medium,
    ),
    (
        &["invalid", "validation", "malformed", "bad request"],
        ErrorCategory::InvalidRequest,
        ErrorSeverity::Low,
    ),
];

fn classify_message(text: &str) -> (ErrorCategory, ErrorSeverity) {
    let lowered = text.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|(needles, _, _)| needles.iter().any(|n| lowered.contains(n)))
        .map(|(_, category, severity)| (*category, *severity))
        .unwrap_or((ErrorCategory::Unknown, ErrorSeverity::Medium))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ProviderFailure {
        ProviderFailure::status(code, "")
    }

    #[test]
    fn test_status_truth_table() {
        let table = [
            (429, ErrorCategory::RateLimit, ErrorSeverity::Medium),
            (401, ErrorCategory::Auth, ErrorSeverity::High),
            (403, ErrorCategory::Auth, ErrorSeverity::High),
            (400, ErrorCategory::InvalidRequest, ErrorSeverity::Low),
            (422, ErrorCategory::InvalidRequest, ErrorSeverity::Low),
            (504, ErrorCategory::Timeout, ErrorSeverity::Medium),
            (502, ErrorCategory::Network, ErrorSeverity::Medium),
            (503, ErrorCategory::Network, ErrorSeverity::Medium),
            (418, ErrorCategory::Unknown, ErrorSeverity::Medium),
        ];

        for (code, category, severity) in table {
            assert_eq!(classify(&status(code)), (category, severity), "status {}", code);
        }
    }

    #[test]
    fn test_transport_failures() {
        assert_eq!(
            classify(&ProviderFailure::Connection("connection refused".into())),
            (ErrorCategory::Network, ErrorSeverity::Medium)
        );
        assert_eq!(
            classify(&ProviderFailure::Timeout("after 5s".into())),
            (ErrorCategory::Timeout, ErrorSeverity::Medium)
        );
    }

    #[test]
    fn test_gate_rejections() {
        assert_eq!(
            classify(&ProviderFailure::CircuitOpen),
            (ErrorCategory::ProviderUnavailable, ErrorSeverity::Low)
        );
        assert_eq!(
            classify(&ProviderFailure::RateLimited),
            (ErrorCategory::RateLimit, ErrorSeverity::Medium)
        );
        assert_eq!(
            classify(&ProviderFailure::Internal("adapter panicked".into())),
            (ErrorCategory::Unknown, ErrorSeverity::Critical)
        );
    }

    #[test]
    fn test_keyword_fallback() {
        let cases = [
            ("io", "Connection reset by peer", ErrorCategory::Network),
            ("client", "Request timed out", ErrorCategory::Timeout),
            ("api", "Invalid API key provided", ErrorCategory::Auth),
            ("api", "You exceeded your current quota", ErrorCategory::RateLimit),
            ("schema", "malformed payload", ErrorCategory::InvalidRequest),
            ("weird", "something odd happened", ErrorCategory::Unknown),
        ];

        for (kind, message, expected) in cases {
            let (category, _) = classify(&ProviderFailure::other(kind, message));
            assert_eq!(category, expected, "{}: {}", kind, message);
        }
    }

    #[test]
    fn test_unmatched_is_unknown_medium() {
        assert_eq!(
            classify(&ProviderFailure::other("mystery", "???")),
            (ErrorCategory::Unknown, ErrorSeverity::Medium)
        );
    }
}
