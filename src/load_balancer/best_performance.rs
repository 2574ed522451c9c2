//! Best-performance ordering.
//!
//! Three groups, each internally stable in priority order:
//! 1. Providers at or above the minimum score with latency samples, by p50 ascending
//! 2. Providers at or above the minimum score with no samples yet
//! 3. Providers below the minimum score

use std::sync::Arc;

use crate::load_balancer::SelectionStrategy;
use crate::provider::Provider;

#[derive(Debug, Clone, Copy)]
pub struct BestPerformance {
    min_score: f64,
}

impl BestPerformance {
    pub const DEFAULT_MIN_SCORE: f64 = 0.5;

    pub fn new(min_score: f64) -> Self {
        Self { min_score }
    }
}

impl SelectionStrategy for BestPerformance {
    fn order(&self, candidates: Vec<Arc<Provider>>) -> Vec<Arc<Provider>> {
        let mut measured = Vec::new();
        let mut unmeasured = Vec::new();
        let mut degraded = Vec::new();

        for provider in candidates {
            if provider.health().availability_score() < self.min_score {
                degraded.push(provider);
                continue;
            }
            match provider.health().latency_percentiles().p50 {
                Some(p50) => measured.push((p50, provider)),
                None => unmeasured.push(provider),
            }
        }

        // Stable sort keeps priority order among equal p50 values.
        measured.sort_by_key(|(p50, _)| *p50);

        measured
            .into_iter()
            .map(|(_, p)| p)
            .chain(unmeasured)
            .chain(degraded)
            .collect()
    }
}
