//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Chain execution → registered providers capable of the operation
//!     → Drop providers whose breaker forbids traffic
//!     → Sort by priority (weight descending, then name)
//!     → Apply strategy:
//!         - priority.rs (keep priority order)
//!         - round_robin.rs (rotate the starting offset)
//!         - weighted.rs (random order, biased by availability score)
//!         - best_performance.rs (fastest healthy p50 first)
//!     → Ordered candidate list
//! ```
//!
//! # Design Decisions
//! - Strategies only reorder; exclusion happens once, before any strategy runs
//! - Every strategy starts from the same priority order, so ties are stable
//! - Ordering never mutates breaker state

pub mod best_performance;
pub mod priority;
pub mod round_robin;
pub mod weighted;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::provider::Provider;

pub use best_performance::BestPerformance;
pub use priority::PriorityOrder;
pub use round_robin::RoundRobin;
pub use weighted::WeightedRandom;

/// Ordering strategy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Priority,
    RoundRobin,
    WeightedRandom,
    BestPerformance,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Priority => "priority",
            Strategy::RoundRobin => "round_robin",
            Strategy::WeightedRandom => "weighted_random",
            Strategy::BestPerformance => "best_performance",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reorders candidates that are already selectable and in priority order.
pub trait SelectionStrategy: Send + Sync {
    fn order(&self, candidates: Vec<Arc<Provider>>) -> Vec<Arc<Provider>>;
}

/// Owns one instance of each strategy so stateful ones (round-robin offset,
/// random generator) persist across requests.
pub struct LoadBalancer {
    priority: PriorityOrder,
    round_robin: RoundRobin,
    weighted: WeightedRandom,
    best_performance: BestPerformance,
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(BestPerformance::DEFAULT_MIN_SCORE)
    }
}

impl LoadBalancer {
    pub fn new(min_score: f64) -> Self {
        Self {
            priority: PriorityOrder,
            round_robin: RoundRobin::new(),
            weighted: WeightedRandom::new(),
            best_performance: BestPerformance::new(min_score),
        }
    }

    /// Deterministic weighted-random ordering, for tests and replay.
    pub fn with_seed(min_score: f64, seed: u64) -> Self {
        Self {
            weighted: WeightedRandom::with_seed(seed),
            ..Self::new(min_score)
        }
    }

    pub fn order(&self, providers: &[Arc<Provider>], strategy: Strategy) -> Vec<Arc<Provider>> {
        let mut candidates: Vec<Arc<Provider>> = providers
            .iter()
            .filter(|p| p.is_selectable())
            .cloned()
            .collect();
        sort_by_priority(&mut candidates);
        self.strategy(strategy).order(candidates)
    }

    fn strategy(&self, strategy: Strategy) -> &dyn SelectionStrategy {
        match strategy {
            Strategy::Priority => &self.priority,
            Strategy::RoundRobin => &self.round_robin,
            Strategy::WeightedRandom => &self.weighted,
            Strategy::BestPerformance => &self.best_performance,
        }
    }
}

/// Weight descending, then name ascending.
pub fn sort_by_priority(providers: &mut [Arc<Provider>]) {
    providers.sort_by(|a, b| {
        b.identity()
            .priority
            .cmp(&a.identity().priority)
            .then_with(|| a.name().cmp(b.name()))
    });
}
