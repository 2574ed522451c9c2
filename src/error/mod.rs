//! Error taxonomy shared by every layer of the relay.
//!
//! # Data Flow
//! ```text
//! Adapter call fails
//!     → ProviderFailure (typed, returned by the adapter)
//!     → classifier.rs (category + severity, pure)
//!     → sanitize.rs (strip credentials from the message)
//!     → ErrorRecord (kept in the provider's bounded telemetry window)
//! ```
//!
//! # Design Decisions
//! - Adapters never raise; they return `ProviderFailure` values
//! - Classification is a pure function with a fixed truth table
//! - No error text leaves this module unsanitized

pub mod classifier;
pub mod sanitize;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

pub use classifier::classify;
pub use sanitize::sanitize;

/// Failure category, used to pick a recovery policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    RateLimit,
    Timeout,
    Auth,
    InvalidRequest,
    ProviderUnavailable,
    Unknown,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Network,
        ErrorCategory::RateLimit,
        ErrorCategory::Timeout,
        ErrorCategory::Auth,
        ErrorCategory::InvalidRequest,
        ErrorCategory::ProviderUnavailable,
        ErrorCategory::Unknown,
    ];

    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Auth => "auth",
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::ProviderUnavailable => "provider_unavailable",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Transient failures are worth retrying and falling back on.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network | ErrorCategory::RateLimit | ErrorCategory::Timeout
        )
    }

    /// Message suitable for showing to an end user of a front-end.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Network => {
                "Network connection issue. Please check your connection and try again."
            }
            ErrorCategory::RateLimit => {
                "Rate limit exceeded. Please wait a moment before trying again."
            }
            ErrorCategory::Timeout => "The provider took too long to respond. Please try again.",
            ErrorCategory::Auth => "Authentication failed. Please check your API keys in settings.",
            ErrorCategory::InvalidRequest => {
                "The request was rejected as invalid. Please check your input and try again."
            }
            ErrorCategory::ProviderUnavailable => {
                "Service provider unavailable. It might be temporarily down."
            }
            ErrorCategory::Unknown => "An unexpected error occurred. Please try again.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad a failure is, independent of its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw failure signal returned by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderFailure {
    /// Upstream answered with a non-success status.
    #[error("upstream returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Connection could not be established or was dropped.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The upstream call timed out.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Rejected by the provider's circuit breaker; no call was made.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// Denied by the provider's local rate limiter before the deadline.
    #[error("local rate limit exhausted")]
    RateLimited,

    /// The adapter itself faulted (panicked or broke its contract).
    #[error("adapter fault: {0}")]
    Internal(String),

    /// Anything else; classified by message keywords.
    #[error("{kind}: {message}")]
    Other { kind: String, message: String },
}

impl ProviderFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn other(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// A classified, sanitized failure retained for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub provider: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub correlation_id: Uuid,
    pub message: String,
    #[serde(with = "unix_millis")]
    pub at: SystemTime,
}

impl ErrorRecord {
    /// Classify and sanitize a failure observed for `provider`.
    pub fn new(provider: &str, failure: &ProviderFailure, correlation_id: Uuid) -> Self {
        let (category, severity) = classify(failure);
        Self {
            provider: provider.to_string(),
            category,
            severity,
            correlation_id,
            message: sanitize(&failure.to_string()),
            at: SystemTime::now(),
        }
    }
}

mod unix_millis {
    use serde::Serializer;
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S: Serializer>(at: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        serializer.serialize_u64(millis)
    }
}

/// Errors surfaced by registration and configuration, never by `execute`.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },

    #[error("provider '{0}' is not registered")]
    UnknownProvider(String),

    #[error("adapter setup failed for '{name}': {reason}")]
    Adapter { name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_sanitized_and_classified() {
        let failure = ProviderFailure::status(401, "bad key sk-abcdefghijklmnop1234");
        let record = ErrorRecord::new("openai", &failure, Uuid::new_v4());

        assert_eq!(record.category, ErrorCategory::Auth);
        assert_eq!(record.severity, ErrorSeverity::High);
        assert!(!record.message.contains("sk-abcdefghijklmnop1234"));
        assert!(record.message.contains("[REDACTED]"));
    }

    #[test]
    fn test_transient_categories() {
        assert!(ErrorCategory::Network.is_transient());
        assert!(ErrorCategory::Timeout.is_transient());
        assert!(ErrorCategory::RateLimit.is_transient());
        assert!(!ErrorCategory::Auth.is_transient());
        assert!(!ErrorCategory::InvalidRequest.is_transient());
    }
}
