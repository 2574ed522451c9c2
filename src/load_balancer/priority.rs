//! Priority ordering.

use std::sync::Arc;

use crate::load_balancer::SelectionStrategy;
use crate::provider::Provider;

/// Keeps the configured priority order.
#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityOrder;

impl SelectionStrategy for PriorityOrder {
    fn order(&self, candidates: Vec<Arc<Provider>>) -> Vec<Arc<Provider>> {
        candidates
    }
}
