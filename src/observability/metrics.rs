//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): chain executions by outcome
//! - `relay_attempts_total` (counter): failed provider attempts by provider, category
//! - `relay_attempt_duration_seconds` (histogram): adapter call latency per provider
//! - `relay_breaker_state` (gauge): 0=closed, 0.5=half_open, 1=open
//! - `relay_rate_limited_total` (counter): limiter denials per provider
//! - `relay_provider_score` (gauge): availability score per provider

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ErrorCategory;
use crate::resilience::CircuitState;

/// Start the Prometheus scrape listener. Requires a running Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Outcome label for `relay_requests_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Success,
    Exhausted,
    DeadlineExceeded,
    NoCandidates,
}

impl RequestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::Exhausted => "exhausted",
            RequestOutcome::DeadlineExceeded => "deadline_exceeded",
            RequestOutcome::NoCandidates => "no_candidates",
        }
    }
}

pub fn record_request(outcome: RequestOutcome) {
    counter!("relay_requests_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_attempt(provider: &str, category: ErrorCategory) {
    counter!(
        "relay_attempts_total",
        "provider" => provider.to_string(),
        "category" => category.as_str()
    )
    .increment(1);
}

pub fn record_attempt_duration(provider: &str, elapsed: Duration) {
    histogram!("relay_attempt_duration_seconds", "provider" => provider.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_breaker_state(provider: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 0.5,
        CircuitState::Open => 1.0,
    };
    gauge!("relay_breaker_state", "provider" => provider.to_string()).set(value);
}

pub fn record_rate_limited(provider: &str) {
    counter!("relay_rate_limited_total", "provider" => provider.to_string()).increment(1);
}

pub fn record_provider_score(provider: &str, score: f64) {
    gauge!("relay_provider_score", "provider" => provider.to_string()).set(score);
}
