//! Outcome of one chain execution.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorCategory, ErrorRecord, ErrorSeverity};

/// One provider's failed (or skipped) participation in an execution.
///
/// `category` and `message` describe the last failure seen on that provider;
/// `retries` counts same-provider retries after the first call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub provider: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub retries: u32,
    pub message: String,
}

impl AttemptRecord {
    pub fn from_error(record: &ErrorRecord, retries: u32) -> Self {
        Self {
            provider: record.provider.clone(),
            category: record.category,
            severity: record.severity,
            retries,
            message: record.message.clone(),
        }
    }
}

/// Result of `ProviderChain::execute`. Failures are values, never panics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_used: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    pub correlation_id: Uuid,
    pub deadline_exceeded: bool,
    pub elapsed_ms: u64,
    /// End-user wording for the failure, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

impl ExecuteResult {
    /// Category of the last recorded failure, if any.
    pub fn last_category(&self) -> Option<ErrorCategory> {
        self.attempts.last().map(|a| a.category)
    }

    pub fn attempt_for(&self, provider: &str) -> Option<&AttemptRecord> {
        self.attempts.iter().find(|a| a.provider == provider)
    }
}

/// User-facing wording for an exhausted chain.
pub(crate) fn failure_message(attempts: &[AttemptRecord], deadline_exceeded: bool) -> String {
    if deadline_exceeded {
        return ErrorCategory::Timeout.user_message().to_string();
    }
    // A configuration problem anywhere is more actionable than a transient one.
    let category = attempts
        .iter()
        .find(|a| matches!(a.category, ErrorCategory::Auth | ErrorCategory::InvalidRequest))
        .or_else(|| attempts.last())
        .map(|a| a.category)
        .unwrap_or(ErrorCategory::ProviderUnavailable);
    category.user_message().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(provider: &str, category: ErrorCategory) -> AttemptRecord {
        AttemptRecord {
            provider: provider.to_string(),
            category,
            severity: ErrorSeverity::Medium,
            retries: 0,
            message: String::new(),
        }
    }

    #[test]
    fn test_failure_message_prefers_configuration_errors() {
        let attempts = vec![
            attempt("a", ErrorCategory::Auth),
            attempt("b", ErrorCategory::Network),
        ];
        assert_eq!(
            failure_message(&attempts, false),
            ErrorCategory::Auth.user_message()
        );
    }

    #[test]
    fn test_failure_message_without_attempts() {
        assert_eq!(
            failure_message(&[], false),
            ErrorCategory::ProviderUnavailable.user_message()
        );
        assert_eq!(failure_message(&[], true), ErrorCategory::Timeout.user_message());
    }
}
