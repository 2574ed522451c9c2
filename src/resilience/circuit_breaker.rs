//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, calls fail fast
//! - Half-Open: a single trial call tests whether the provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow() after recovery_timeout (admits one trial)
//! Half-Open → Closed: consecutive_successes >= success_threshold
//! Half-Open → Open: any trial failure (opened_at reset)
//! ```
//!
//! # Design Decisions
//! - Per-provider circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open, admitted under the breaker's lock
//! - Every transition starts a new generation; a `Permit` from an earlier
//!   generation is stale and its outcome is ignored

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

/// An admitted call, tied to the breaker generation that admitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    generation: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    generation: u64,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            generation: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Thread-safe circuit breaker guarding one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(provider: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let provider = provider.into();
        metrics::record_breaker_state(&provider, CircuitState::Closed);
        Self {
            provider,
            config,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Ask to send a call. May move Open → Half-Open and consume the trial slot.
    pub fn admit(&self) -> Option<Permit> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                if !self.recovery_elapsed(&inner) {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.generation += 1;
                inner.consecutive_successes = 0;
                inner.trial_in_flight = true;
                tracing::info!(provider = %self.provider, "Circuit breaker half-open, admitting trial call");
                metrics::record_breaker_state(&self.provider, CircuitState::HalfOpen);
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                inner.trial_in_flight = true;
            }
        }
        Some(Permit {
            generation: inner.generation,
        })
    }

    pub fn allow(&self) -> bool {
        self.admit().is_some()
    }

    /// Success of a call admitted by `permit`. Ignored if the permit is stale.
    pub fn record_success(&self, permit: Permit) {
        let mut inner = self.lock();
        if self.is_current(&inner, permit) {
            self.succeed(&mut inner);
        }
    }

    /// Failure of a call admitted by `permit`. Ignored if the permit is stale.
    pub fn record_failure(&self, permit: Permit) {
        let mut inner = self.lock();
        if self.is_current(&inner, permit) {
            self.fail(&mut inner);
        }
    }

    /// The call admitted by `permit` ended without an outcome.
    pub fn release(&self, permit: Permit) {
        let mut inner = self.lock();
        if self.is_current(&inner, permit) && inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn is_current(&self, inner: &BreakerInner, permit: Permit) -> bool {
        let current = inner.generation == permit.generation;
        if !current {
            tracing::debug!(provider = %self.provider, "Ignoring outcome admitted before the last transition");
        }
        current
    }

    /// Whether `allow()` would currently admit a call. Does not change state.
    pub fn is_selectable(&self) -> bool {
        let inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.recovery_elapsed(&inner),
            CircuitState::HalfOpen => !inner.trial_in_flight,
        }
    }

    /// Record a success regardless of which state admitted the call.
    pub fn on_success(&self) {
        let mut inner = self.lock();
        self.succeed(&mut inner);
    }

    fn succeed(&self, inner: &mut BreakerInner) {
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    *inner = BreakerInner {
                        generation: inner.generation + 1,
                        ..BreakerInner::default()
                    };
                    tracing::info!(provider = %self.provider, "Circuit breaker closed (recovered)");
                    metrics::record_breaker_state(&self.provider, CircuitState::Closed);
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failure regardless of which state admitted the call.
    pub fn on_failure(&self) {
        let mut inner = self.lock();
        self.fail(&mut inner);
    }

    fn fail(&self, inner: &mut BreakerInner) {
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    let failures = inner.consecutive_failures;
                    self.trip(inner);
                    tracing::warn!(
                        provider = %self.provider,
                        failures,
                        "Circuit breaker opened"
                    );
                }
            }
            CircuitState::HalfOpen => {
                self.trip(inner);
                tracing::warn!(provider = %self.provider, "Circuit breaker reopened during recovery");
            }
            CircuitState::Open => {}
        }
    }

    /// Release the trial slot regardless of which state admitted the call.
    pub fn on_abandoned(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn trip(&self, inner: &mut BreakerInner) {
        inner.state = CircuitState::Open;
        inner.generation += 1;
        inner.opened_at = Some(Instant::now());
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.trial_in_flight = false;
        metrics::record_breaker_state(&self.provider, CircuitState::Open);
    }

    fn recovery_elapsed(&self, inner: &BreakerInner) -> bool {
        inner
            .opened_at
            .map(|opened_at| opened_at.elapsed() >= self.config.recovery_timeout)
            .unwrap_or(true)
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.lock().consecutive_successes
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.lock().opened_at
    }
}
