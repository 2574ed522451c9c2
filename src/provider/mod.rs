//! Provider abstraction.
//!
//! # Data Flow
//! ```text
//! Registration:
//!     ProviderIdentity + ProviderAdapter + settings
//!     → entry.rs (Provider: adapter plus its breaker, limiter and health record)
//!
//! Adapters:
//!     → http.rs (JSON over HTTP via reqwest)
//!     → offline.rs (terminal local fallback)
//! ```
//!
//! # Design Decisions
//! - Adapters return typed outcomes; they never panic across the trait boundary
//! - Identity is immutable once registered; re-registering replaces the entry

pub mod entry;
pub mod http;
pub mod offline;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::{ProviderFailure, RelayError};
use crate::resilience::Deadline;

pub use entry::{Provider, ProviderSettings};
pub use http::HttpAdapter;
pub use offline::OfflineAdapter;

/// Name, priority weight and capability tags of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderIdentity {
    pub name: String,
    /// Higher is preferred by priority ordering.
    pub priority: u32,
    /// Operations this provider accepts. Empty means all.
    pub capabilities: BTreeSet<String>,
}

impl ProviderIdentity {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            capabilities: BTreeSet::new(),
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn supports(&self, operation: &str) -> bool {
        self.capabilities.is_empty() || self.capabilities.contains(operation)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.name.trim().is_empty() {
            return Err(RelayError::InvalidProvider {
                name: self.name.clone(),
                reason: "name must not be empty".to_string(),
            });
        }
        if self.capabilities.iter().any(|c| c.trim().is_empty()) {
            return Err(RelayError::InvalidProvider {
                name: self.name.clone(),
                reason: "capability tags must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// A backing service the relay can call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + 'static {
    /// Perform `operation`. Must give up by `deadline`.
    async fn call(
        &self,
        operation: &str,
        payload: &Value,
        deadline: Deadline,
    ) -> Result<Value, ProviderFailure>;

    /// Cheap liveness probe used by active health checking.
    ///
    /// `Ok(false)` means the adapter has no probe; nothing should be recorded.
    async fn health_check(&self, _deadline: Deadline) -> Result<bool, ProviderFailure> {
        Ok(false)
    }
}
