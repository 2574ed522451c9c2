//! Rolling per-provider health statistics.
//!
//! # Window Policy
//! The window keeps the last `window_size` outcomes (default 50), evicting the
//! oldest on overflow. There is no time horizon; a provider that receives no
//! traffic keeps its last window.
//!
//! # Score
//! Exponentially weighted success ratio folded over the window, oldest first,
//! starting from a neutral prior of 1.0 with smoothing `α = 1 / window_size`:
//!
//! ```text
//! score = 1.0
//! for outcome in window: score += α · (outcome − score)
//! ```
//!
//! A single new outcome moves the score by at most `α`, and the score is a pure
//! function of the window contents.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{ErrorCategory, ErrorRecord};
use crate::observability::metrics;

/// Window sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthConfig {
    /// Outcomes kept in the rolling window.
    pub window_size: usize,
    /// Sanitized error records kept for diagnostics.
    pub max_recent_errors: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            max_recent_errors: 20,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    success: bool,
    latency: Option<Duration>,
    category: Option<ErrorCategory>,
}

/// Lifetime counters, kept beside the window for reporting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProviderTotals {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    #[serde(skip)]
    total_latency: Duration,
}

impl ProviderTotals {
    pub fn average_latency(&self) -> Option<Duration> {
        if self.successes == 0 {
            None
        } else {
            Some(self.total_latency / self.successes as u32)
        }
    }
}

/// Latency percentiles over successful calls in the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyPercentiles {
    pub p50: Option<Duration>,
    pub p95: Option<Duration>,
}

#[derive(Debug, Default)]
struct HealthInner {
    window: VecDeque<Outcome>,
    recent_errors: VecDeque<ErrorRecord>,
    totals: ProviderTotals,
}

/// Health record for one provider.
#[derive(Debug)]
pub struct HealthMonitor {
    provider: String,
    config: HealthConfig,
    inner: Mutex<HealthInner>,
}

impl HealthMonitor {
    pub fn new(provider: impl Into<String>, config: HealthConfig) -> Self {
        let config = HealthConfig {
            window_size: config.window_size.max(1),
            ..config
        };
        Self {
            provider: provider.into(),
            config,
            inner: Mutex::new(HealthInner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HealthInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_success(&self, latency: Duration) {
        let score = {
            let mut inner = self.lock();
            inner.totals.requests += 1;
            inner.totals.successes += 1;
            inner.totals.total_latency += latency;
            self.push(
                &mut inner,
                Outcome {
                    success: true,
                    latency: Some(latency),
                    category: None,
                },
            )
        };
        metrics::record_provider_score(&self.provider, score);
    }

    pub fn record_failure(&self, category: ErrorCategory) {
        let score = {
            let mut inner = self.lock();
            inner.totals.requests += 1;
            inner.totals.failures += 1;
            self.push(
                &mut inner,
                Outcome {
                    success: false,
                    latency: None,
                    category: Some(category),
                },
            )
        };
        metrics::record_provider_score(&self.provider, score);
    }

    /// Keep a sanitized error record in the bounded telemetry window.
    pub fn record_error(&self, record: ErrorRecord) {
        let mut inner = self.lock();
        if inner.recent_errors.len() >= self.config.max_recent_errors {
            inner.recent_errors.pop_front();
        }
        if self.config.max_recent_errors > 0 {
            inner.recent_errors.push_back(record);
        }
    }

    fn push(&self, inner: &mut HealthInner, outcome: Outcome) -> f64 {
        if inner.window.len() >= self.config.window_size {
            inner.window.pop_front();
        }
        inner.window.push_back(outcome);
        self.score_of(&inner.window)
    }

    fn score_of(&self, window: &VecDeque<Outcome>) -> f64 {
        let alpha = 1.0 / self.config.window_size as f64;
        window.iter().fold(1.0, |score, outcome| {
            let x = if outcome.success { 1.0 } else { 0.0 };
            score + alpha * (x - score)
        })
    }

    pub fn availability_score(&self) -> f64 {
        self.score_of(&self.lock().window)
    }

    pub fn latency_percentiles(&self) -> LatencyPercentiles {
        let inner = self.lock();
        let mut latencies: Vec<Duration> =
            inner.window.iter().filter_map(|o| o.latency).collect();
        latencies.sort_unstable();
        LatencyPercentiles {
            p50: percentile(&latencies, 0.50),
            p95: percentile(&latencies, 0.95),
        }
    }

    /// Failure counts per category within the current window.
    pub fn error_histogram(&self) -> BTreeMap<ErrorCategory, u32> {
        let inner = self.lock();
        let mut histogram = BTreeMap::new();
        for category in inner.window.iter().filter_map(|o| o.category) {
            *histogram.entry(category).or_insert(0) += 1;
        }
        histogram
    }

    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.lock().recent_errors.back().cloned()
    }

    /// Most recent error records, oldest first.
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.lock().recent_errors.iter().cloned().collect()
    }

    pub fn totals(&self) -> ProviderTotals {
        self.lock().totals
    }

    pub fn window_len(&self) -> usize {
        self.lock().window.len()
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted.get(rank.saturating_sub(1)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderFailure;
    use uuid::Uuid;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new("test", HealthConfig::default())
    }

    #[test]
    fn test_fresh_monitor_is_fully_available() {
        let m = monitor();
        assert_eq!(m.availability_score(), 1.0);
        assert_eq!(m.latency_percentiles(), LatencyPercentiles::default());
    }

    #[test]
    fn test_recovery_is_smooth_and_monotonic() {
        let m = monitor();
        for _ in 0..10 {
            m.record_failure(ErrorCategory::Network);
        }
        let after_failures = m.availability_score();
        assert!(after_failures < 1.0);

        let mut previous = after_failures;
        for i in 0..10 {
            m.record_success(Duration::from_millis(100));
            let score = m.availability_score();
            assert!(score > previous, "success {} did not raise the score", i);
            assert!(score < 1.0);
            previous = score;
        }
    }

    #[test]
    fn test_single_outcome_bounded_by_window() {
        let m = monitor();
        let bound = 1.0 / m.config().window_size as f64 + 1e-12;
        let mut previous = m.availability_score();

        let pattern = [true, false, false, true, false, true, true, true, false];
        for i in 0..200 {
            if pattern[i % pattern.len()] {
                m.record_success(Duration::from_millis(10));
            } else {
                m.record_failure(ErrorCategory::Timeout);
            }
            let score = m.availability_score();
            assert!((score - previous).abs() <= bound, "step {} moved {}", i, score - previous);
            assert!((0.0..=1.0).contains(&score));
            previous = score;
        }
    }

    #[test]
    fn test_window_evicts_oldest() {
        let m = HealthMonitor::new(
            "small",
            HealthConfig {
                window_size: 3,
                max_recent_errors: 2,
            },
        );
        m.record_failure(ErrorCategory::Auth);
        m.record_success(Duration::from_millis(1));
        m.record_success(Duration::from_millis(1));
        m.record_success(Duration::from_millis(1));

        assert_eq!(m.window_len(), 3);
        assert!(m.error_histogram().is_empty());
        assert_eq!(m.totals().requests, 4);
        assert_eq!(m.totals().failures, 1);
    }

    #[test]
    fn test_score_recomputable_from_window() {
        let a = monitor();
        let b = monitor();
        for _ in 0..60 {
            a.record_failure(ErrorCategory::Network);
        }
        for _ in 0..50 {
            a.record_success(Duration::from_millis(5));
            b.record_success(Duration::from_millis(5));
        }
        assert_eq!(a.availability_score(), b.availability_score());
    }

    #[test]
    fn test_latency_percentiles() {
        let m = monitor();
        for ms in 1..=20 {
            m.record_success(Duration::from_millis(ms * 10));
        }
        m.record_failure(ErrorCategory::Network);

        let p = m.latency_percentiles();
        assert_eq!(p.p50, Some(Duration::from_millis(100)));
        assert_eq!(p.p95, Some(Duration::from_millis(190)));
        assert_eq!(m.totals().average_latency(), Some(Duration::from_millis(105)));
    }

    #[test]
    fn test_error_histogram_and_recent_errors() {
        let m = HealthMonitor::new(
            "hist",
            HealthConfig {
                window_size: 10,
                max_recent_errors: 2,
            },
        );
        m.record_failure(ErrorCategory::Network);
        m.record_failure(ErrorCategory::Network);
        m.record_failure(ErrorCategory::RateLimit);

        for status in [500, 429, 401] {
            m.record_error(ErrorRecord::new(
                "hist",
                &ProviderFailure::status(status, "boom"),
                Uuid::new_v4(),
            ));
        }

        let histogram = m.error_histogram();
        assert_eq!(histogram.get(&ErrorCategory::Network), Some(&2));
        assert_eq!(histogram.get(&ErrorCategory::RateLimit), Some(&1));

        let recent = m.recent_errors();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].category, ErrorCategory::RateLimit);
        assert_eq!(m.last_error().map(|e| e.category), Some(ErrorCategory::Auth));
    }
}
