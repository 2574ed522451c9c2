//! Weighted-random ordering.
//!
//! A full random permutation where each provider's chance of coming first is
//! proportional to its availability score. Each provider draws a key
//! `ln(u) / score` with `u` uniform in `(0, 1]` and the list is sorted by key,
//! highest first. Providers with a zero score go last, in priority order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::SelectionStrategy;
use crate::provider::Provider;

#[derive(Debug)]
pub struct WeightedRandom {
    rng: Mutex<StdRng>,
}

impl Default for WeightedRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightedRandom {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl SelectionStrategy for WeightedRandom {
    fn order(&self, candidates: Vec<Arc<Provider>>) -> Vec<Arc<Provider>> {
        let (weighted, unweighted): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .map(|p| {
                let score = p.health().availability_score();
                (p, score)
            })
            .partition(|(_, score)| *score > 0.0);

        let mut keyed: Vec<(f64, Arc<Provider>)> = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            weighted
                .into_iter()
                .map(|(p, score)| {
                    let u: f64 = 1.0 - rng.gen::<f64>();
                    (u.ln() / score, p)
                })
                .collect()
        };
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0));

        keyed
            .into_iter()
            .map(|(_, p)| p)
            .chain(unweighted.into_iter().map(|(p, _)| p))
            .collect()
    }
}
