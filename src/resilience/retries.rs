//! Recovery policies.
//!
//! # Responsibilities
//! - Map each error category to a retry/backoff policy
//! - Provide a conservative default for categories without an entry
//! - Compute the jittered delay before a same-provider retry
//!
//! # Design Decisions
//! - Policies are plain data, deserializable from config
//! - Configuration-class failures (auth, invalid request) are never retried
//! - Jitter is always applied; a zero fraction is clamped up to a small floor

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ErrorCategory;
use crate::resilience::backoff::calculate_backoff;

/// Smallest jitter applied, so retries after a shared outage never synchronize.
pub const MIN_JITTER_FRACTION: f64 = 0.05;

/// Retry behavior for one error category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Whether the same provider may be retried at all.
    pub retryable: bool,
    /// Retries on the same provider after the first failed call.
    pub max_retries_same_provider: u32,
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Growth factor applied per retry.
    pub backoff_multiplier: f64,
    /// Random spread around the computed delay, as a fraction of it.
    pub jitter_fraction: f64,
    /// Upper bound on the unjittered delay.
    #[serde(with = "millis")]
    pub max_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::conservative()
    }
}

impl RecoveryPolicy {
    /// Single retry, then advance.
    pub fn conservative() -> Self {
        Self {
            retryable: true,
            max_retries_same_provider: 1,
            base_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.2,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Never retry on the same provider.
    pub fn no_retry() -> Self {
        Self {
            retryable: false,
            max_retries_same_provider: 0,
            ..Self::conservative()
        }
    }

    /// Retries permitted after `retries_done` retries already happened.
    pub fn allows_retry(&self, retries_done: u32) -> bool {
        self.retryable && retries_done < self.max_retries_same_provider
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay,
            self.backoff_multiplier,
            self.max_delay,
            self.jitter_fraction.max(MIN_JITTER_FRACTION),
        )
    }
}

/// Category → policy lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPolicyRegistry {
    policies: HashMap<ErrorCategory, RecoveryPolicy>,
    fallback: RecoveryPolicy,
}

impl Default for RecoveryPolicyRegistry {
    fn default() -> Self {
        let mut policies = HashMap::new();
        policies.insert(
            ErrorCategory::Network,
            RecoveryPolicy {
                retryable: true,
                max_retries_same_provider: 2,
                base_delay: Duration::from_millis(200),
                backoff_multiplier: 2.0,
                jitter_fraction: 0.2,
                max_delay: Duration::from_secs(3),
            },
        );
        policies.insert(
            ErrorCategory::Timeout,
            RecoveryPolicy {
                retryable: true,
                max_retries_same_provider: 1,
                base_delay: Duration::from_millis(500),
                backoff_multiplier: 2.0,
                jitter_fraction: 0.2,
                max_delay: Duration::from_secs(3),
            },
        );
        policies.insert(
            ErrorCategory::RateLimit,
            RecoveryPolicy {
                retryable: true,
                max_retries_same_provider: 1,
                base_delay: Duration::from_secs(1),
                backoff_multiplier: 2.0,
                jitter_fraction: 0.25,
                max_delay: Duration::from_secs(10),
            },
        );
        policies.insert(ErrorCategory::Auth, RecoveryPolicy::no_retry());
        policies.insert(ErrorCategory::InvalidRequest, RecoveryPolicy::no_retry());
        policies.insert(ErrorCategory::ProviderUnavailable, RecoveryPolicy::no_retry());

        Self {
            policies,
            fallback: RecoveryPolicy::conservative(),
        }
    }
}

impl RecoveryPolicyRegistry {
    /// Registry with no explicit entries; everything uses `fallback`.
    pub fn with_fallback(fallback: RecoveryPolicy) -> Self {
        Self {
            policies: HashMap::new(),
            fallback,
        }
    }

    pub fn policy_for(&self, category: ErrorCategory) -> RecoveryPolicy {
        self.policies
            .get(&category)
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn set(&mut self, category: ErrorCategory, policy: RecoveryPolicy) {
        self.policies.insert(category, policy);
    }

    /// Apply overrides on top of the current entries.
    pub fn with_overrides(mut self, overrides: &HashMap<ErrorCategory, RecoveryPolicy>) -> Self {
        for (category, policy) in overrides {
            self.set(*category, *policy);
        }
        self
    }

    pub fn fallback(&self) -> RecoveryPolicy {
        self.fallback
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_failures_not_retried() {
        let registry = RecoveryPolicyRegistry::default();
        for category in [ErrorCategory::Auth, ErrorCategory::InvalidRequest] {
            let policy = registry.policy_for(category);
            assert!(!policy.retryable);
            assert!(!policy.allows_retry(0));
        }
    }

    #[test]
    fn test_unknown_gets_single_retry() {
        let registry = RecoveryPolicyRegistry::default();
        let policy = registry.policy_for(ErrorCategory::Unknown);
        assert!(policy.allows_retry(0));
        assert!(!policy.allows_retry(1));
    }

    #[test]
    fn test_transient_failures_retry() {
        let registry = RecoveryPolicyRegistry::default();
        assert!(registry.policy_for(ErrorCategory::Network).allows_retry(1));
        assert!(!registry.policy_for(ErrorCategory::Network).allows_retry(2));
        assert!(registry.policy_for(ErrorCategory::Timeout).allows_retry(0));
        assert!(registry.policy_for(ErrorCategory::RateLimit).allows_retry(0));
    }

    #[test]
    fn test_missing_entry_uses_fallback() {
        let registry = RecoveryPolicyRegistry::with_fallback(RecoveryPolicy::no_retry());
        assert_eq!(registry.policy_for(ErrorCategory::Network), RecoveryPolicy::no_retry());
    }

    #[test]
    fn test_overrides_replace_entries() {
        let mut overrides = HashMap::new();
        overrides.insert(ErrorCategory::Auth, RecoveryPolicy::conservative());
        let registry = RecoveryPolicyRegistry::default().with_overrides(&overrides);
        assert!(registry.policy_for(ErrorCategory::Auth).retryable);
    }

    #[test]
    fn test_zero_jitter_is_floored() {
        let policy = RecoveryPolicy {
            jitter_fraction: 0.0,
            base_delay: Duration::from_millis(1000),
            ..RecoveryPolicy::conservative()
        };
        let delays: Vec<_> = (0..50).map(|_| policy.delay_for(0)).collect();
        assert!(delays.iter().all(|d| *d >= Duration::from_millis(950)));
        assert!(delays.iter().all(|d| *d < Duration::from_millis(1050)));
        assert!(delays.iter().any(|d| *d != delays[0]));
    }

    #[test]
    fn test_policy_from_toml() {
        let policy: RecoveryPolicy = toml::from_str(
            r#"
            retryable = true
            max_retries_same_provider = 3
            base_delay = 50
            backoff_multiplier = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(policy.max_retries_same_provider, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.jitter_fraction, 0.2);
    }
}
