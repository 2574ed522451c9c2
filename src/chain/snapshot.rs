//! Read-only views of per-provider state for operators.

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::error::{ErrorCategory, ErrorRecord, ErrorSeverity};
use crate::health::ProviderTotals;
use crate::provider::Provider;
use crate::resilience::CircuitState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealthSnapshot {
    pub priority: u32,
    pub capabilities: BTreeSet<String>,
    pub breaker_state: CircuitState,
    pub availability_score: f64,
    #[serde(rename = "latency_p50_ms", serialize_with = "opt_millis")]
    pub latency_p50: Option<Duration>,
    #[serde(rename = "latency_p95_ms", serialize_with = "opt_millis")]
    pub latency_p95: Option<Duration>,
    #[serde(rename = "average_latency_ms", serialize_with = "opt_millis")]
    pub average_latency: Option<Duration>,
    pub recent_error_histogram: BTreeMap<ErrorCategory, u32>,
    pub last_error: Option<ErrorRecord>,
    pub totals: ProviderTotals,
    pub terminal: bool,
    pub rate_limit_tokens: Option<f64>,
}

impl ProviderHealthSnapshot {
    pub fn of(provider: &Provider) -> Self {
        let health = provider.health();
        let percentiles = health.latency_percentiles();
        let totals = health.totals();
        Self {
            priority: provider.identity().priority,
            capabilities: provider.identity().capabilities.clone(),
            breaker_state: provider.breaker().state(),
            availability_score: health.availability_score(),
            latency_p50: percentiles.p50,
            latency_p95: percentiles.p95,
            average_latency: totals.average_latency(),
            recent_error_histogram: health.error_histogram(),
            last_error: health.last_error(),
            totals,
            terminal: provider.is_terminal(),
            rate_limit_tokens: (!provider.is_terminal()).then(|| provider.limiter().available()),
        }
    }
}

/// Aggregate view over the retained error records of every provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorReport {
    pub total_errors: usize,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub by_severity: BTreeMap<ErrorSeverity, usize>,
    pub by_provider: BTreeMap<String, usize>,
    /// Newest first.
    pub recent: Vec<ErrorRecord>,
}

impl ErrorReport {
    pub fn build(records: impl IntoIterator<Item = ErrorRecord>, limit: usize) -> Self {
        let mut report = ErrorReport::default();
        let mut all: Vec<ErrorRecord> = Vec::new();
        for record in records {
            report.total_errors += 1;
            *report.by_category.entry(record.category).or_default() += 1;
            *report.by_severity.entry(record.severity).or_default() += 1;
            *report.by_provider.entry(record.provider.clone()).or_default() += 1;
            all.push(record);
        }
        all.sort_by(|a, b| b.at.cmp(&a.at));
        all.truncate(limit);
        report.recent = all;
        report
    }

    /// Most frequent category, ties going to the first in declaration order.
    pub fn dominant_category(&self) -> Option<ErrorCategory> {
        self.by_category
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(category, _)| *category)
    }
}

fn opt_millis<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_some(&(d.as_secs_f64() * 1_000.0)),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderFailure;
    use uuid::Uuid;

    #[test]
    fn test_report_counts_and_orders() {
        let id = Uuid::new_v4();
        let records = vec![
            ErrorRecord::new("a", &ProviderFailure::status(503, "down"), id),
            ErrorRecord::new("a", &ProviderFailure::status(502, "down"), id),
            ErrorRecord::new("b", &ProviderFailure::status(401, "nope"), id),
        ];
        let report = ErrorReport::build(records, 2);

        assert_eq!(report.total_errors, 3);
        assert_eq!(report.by_provider.get("a"), Some(&2));
        assert_eq!(report.by_category.get(&ErrorCategory::Network), Some(&2));
        assert_eq!(report.by_severity.get(&ErrorSeverity::High), Some(&1));
        assert_eq!(report.recent.len(), 2);
        assert_eq!(report.dominant_category(), Some(ErrorCategory::Network));
    }

    #[test]
    fn test_empty_report() {
        let report = ErrorReport::build(Vec::new(), 10);
        assert_eq!(report.total_errors, 0);
        assert!(report.dominant_category().is_none());
    }
}
