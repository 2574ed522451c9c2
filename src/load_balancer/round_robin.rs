//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::SelectionStrategy;
use crate::provider::Provider;

/// Rotates the starting provider on every call; the rest follow in
/// priority order, wrapping around.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn order(&self, mut candidates: Vec<Arc<Provider>>) -> Vec<Arc<Provider>> {
        if candidates.is_empty() {
            return candidates;
        }
        let offset = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.rotate_left(offset);
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::{names, provider};

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let backends = vec![provider("a", 3), provider("b", 2), provider("c", 1)];

        assert_eq!(names(&lb.order(backends.clone())), vec!["a", "b", "c"]);
        assert_eq!(names(&lb.order(backends.clone())), vec!["b", "c", "a"]);
        assert_eq!(names(&lb.order(backends.clone())), vec!["c", "a", "b"]);
        assert_eq!(names(&lb.order(backends)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty_candidates() {
        let lb = RoundRobin::new();
        assert!(lb.order(Vec::new()).is_empty());
    }
}
