//! A registered provider and its per-provider resilience state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::health::{HealthConfig, HealthMonitor};
use crate::provider::{ProviderAdapter, ProviderIdentity};
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, RateLimiter, RateLimiterConfig,
};

/// Per-provider tuning applied at registration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProviderSettings {
    pub breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimiterConfig,
    pub health: HealthConfig,
    /// Upper bound on a single adapter call, below the caller's deadline.
    pub request_timeout: Option<Duration>,
}

/// One registered provider.
///
/// Breaker, limiter and health each lock independently, so requests touching
/// different providers never contend.
pub struct Provider {
    identity: ProviderIdentity,
    adapter: Arc<dyn ProviderAdapter>,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    health: HealthMonitor,
    terminal: bool,
    request_timeout: Option<Duration>,
}

impl Provider {
    pub fn new(
        identity: ProviderIdentity,
        adapter: Arc<dyn ProviderAdapter>,
        settings: ProviderSettings,
    ) -> Self {
        let name = identity.name.clone();
        Self {
            breaker: CircuitBreaker::new(name.clone(), settings.breaker),
            limiter: RateLimiter::new(name.clone(), settings.rate_limit),
            health: HealthMonitor::new(name, settings.health),
            identity,
            adapter,
            terminal: false,
            request_timeout: settings.request_timeout,
        }
    }

    /// Terminal fallback slot. Its breaker and limiter are never consulted.
    pub fn offline(
        identity: ProviderIdentity,
        adapter: Arc<dyn ProviderAdapter>,
        health: HealthConfig,
    ) -> Self {
        Self {
            terminal: true,
            ..Self::new(
                identity,
                adapter,
                ProviderSettings {
                    health,
                    ..ProviderSettings::default()
                },
            )
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Whether load balancing may place this provider in an ordering.
    pub fn is_selectable(&self) -> bool {
        self.terminal || self.breaker.is_selectable()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("identity", &self.identity)
            .field("breaker", &self.breaker.state())
            .field("terminal", &self.terminal)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::OfflineAdapter;

    #[test]
    fn test_offline_entry_is_terminal_and_selectable() {
        let provider = Provider::offline(
            ProviderIdentity::new("offline", 0),
            Arc::new(OfflineAdapter::passthrough()),
            HealthConfig::default(),
        );
        for _ in 0..10 {
            provider.breaker().on_failure();
        }
        assert!(provider.is_terminal());
        assert!(provider.is_selectable());
    }

    #[test]
    fn test_open_breaker_not_selectable() {
        let provider = Provider::new(
            ProviderIdentity::new("a", 1),
            Arc::new(OfflineAdapter::passthrough()),
            ProviderSettings {
                breaker: CircuitBreakerConfig {
                    failure_threshold: 1,
                    ..CircuitBreakerConfig::default()
                },
                ..ProviderSettings::default()
            },
        );
        provider.breaker().on_failure();
        assert!(!provider.is_selectable());
    }
}
