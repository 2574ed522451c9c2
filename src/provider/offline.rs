//! Terminal offline fallback.
//!
//! Registered last in every ordering and never gated by a breaker or limiter,
//! so a chain that reaches it always has an answer.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::ProviderFailure;
use crate::provider::ProviderAdapter;
use crate::resilience::Deadline;

type Handler = dyn Fn(&str, &Value) -> Result<Value, ProviderFailure> + Send + Sync;

#[derive(Clone)]
pub struct OfflineAdapter {
    handler: Arc<Handler>,
}

impl OfflineAdapter {
    /// Echo the request back, marked as served offline.
    pub fn passthrough() -> Self {
        Self::with_handler(|operation, payload| {
            Ok(json!({
                "offline": true,
                "operation": operation,
                "payload": payload,
            }))
        })
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<Value, ProviderFailure> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
        }
    }
}

impl Default for OfflineAdapter {
    fn default() -> Self {
        Self::passthrough()
    }
}

impl fmt::Debug for OfflineAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineAdapter").finish_non_exhaustive()
    }
}

#[async_trait]
impl ProviderAdapter for OfflineAdapter {
    async fn call(
        &self,
        operation: &str,
        payload: &Value,
        _deadline: Deadline,
    ) -> Result<Value, ProviderFailure> {
        (self.handler)(operation, payload)
    }
}
