//! Configuration schema definitions.
//!
//! Every section has defaults, so an empty file is a valid configuration
//! (with no providers registered).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::health::HealthConfig;
use crate::load_balancer::{BestPerformance, Strategy};
use crate::resilience::{CircuitBreakerConfig, RateLimiterConfig, RecoveryPolicy};

/// Root configuration for the relay.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    pub observability: ObservabilityConfig,
    pub routing: RoutingConfig,
    pub health: HealthSettings,
    /// Per-category overrides of the built-in recovery policies, keyed by
    /// category name (`network`, `rate_limit`, ...).
    pub recovery: BTreeMap<String, RecoveryPolicy>,
    pub providers: Vec<ProviderConfig>,
}

/// Public API listener.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Deadline applied when a request does not carry one.
    pub default_timeout_ms: u64,
    /// Upper bound on a caller-supplied deadline.
    pub max_timeout_ms: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            default_timeout_ms: 30_000,
            max_timeout_ms: 120_000,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }
}

/// Admin API listener.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    /// Bearer token required on admin routes.
    pub api_key: String,
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: "admin-secret-key".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    pub metrics_enabled: bool,
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub default_strategy: Strategy,
    /// Minimum availability score for best-performance ordering.
    pub min_score: f64,
    /// Fixed seed for weighted-random ordering.
    pub seed: Option<u64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::Priority,
            min_score: BestPerformance::DEFAULT_MIN_SCORE,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthSettings {
    pub window_size: usize,
    pub max_recent_errors: usize,
    pub probe: ProbeConfig,
}

impl Default for HealthSettings {
    fn default() -> Self {
        let window = HealthConfig::default();
        Self {
            window_size: window.window_size,
            max_recent_errors: window.max_recent_errors,
            probe: ProbeConfig::default(),
        }
    }
}

impl HealthSettings {
    pub fn window(&self) -> HealthConfig {
        HealthConfig {
            window_size: self.window_size,
            max_recent_errors: self.max_recent_errors,
        }
    }
}

/// Active health probing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 30,
            timeout_ms: 5_000,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Http,
    Offline,
}

/// One provider definition.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,

    #[serde(default = "default_priority")]
    pub priority: u32,

    /// Operations served. Empty means all.
    #[serde(default)]
    pub capabilities: Vec<String>,

    #[serde(default)]
    pub kind: ProviderKind,

    /// Required for `http` providers.
    pub endpoint: Option<String>,

    /// Optional liveness URL probed by active health checks.
    pub health_endpoint: Option<String>,

    /// Environment variable holding the bearer token.
    pub api_key_env: Option<String>,

    pub request_timeout_ms: Option<u64>,

    #[serde(default)]
    pub breaker: BreakerSettings,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

fn default_priority() -> u32 {
    1
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            recovery_timeout_secs: defaults.recovery_timeout.as_secs(),
            success_threshold: defaults.success_threshold,
        }
    }
}

impl From<BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold,
            recovery_timeout: Duration::from_secs(settings.recovery_timeout_secs),
            success_threshold: settings.success_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Burst size in requests.
    pub capacity: f64,
    /// Requests per second.
    pub refill_per_sec: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let defaults = RateLimiterConfig::default();
        Self {
            capacity: defaults.capacity,
            refill_per_sec: defaults.refill_rate,
        }
    }
}

impl From<RateLimitSettings> for RateLimiterConfig {
    fn from(settings: RateLimitSettings) -> Self {
        Self {
            capacity: settings.capacity,
            refill_rate: settings.refill_per_sec,
        }
    }
}
