//! Provider Relay
//!
//! Resilience and routing layer in front of interchangeable external providers.
//! Callers name an operation; the relay orders the capable providers, guards
//! each with a circuit breaker and a token bucket, retries per error category,
//! and falls back down the chain until one succeeds or the deadline passes.
//!
//! ```text
//!  caller ──▶ http (POST /v1/execute) ──▶ chain ──▶ load_balancer (order)
//!                                          │
//!                                          ├──▶ resilience (breaker, limiter, retry, deadline)
//!                                          ├──▶ provider (adapter call)
//!                                          ├──▶ error (classify, sanitize)
//!                                          └──▶ health (rolling window, score)
//!
//!  admin (GET /admin/*) ──▶ snapshots of the above
//!  config + lifecycle ──▶ build, hot reload, shutdown
//!  observability ──▶ tracing logs, Prometheus metrics
//! ```

// Core
pub mod chain;
pub mod error;
pub mod provider;

// Traffic management
pub mod health;
pub mod load_balancer;
pub mod resilience;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use chain::{AttemptRecord, ExecuteResult, ProviderChain};
pub use config::RelayConfig;
pub use error::{ErrorCategory, ErrorSeverity, ProviderFailure, RelayError};
pub use lifecycle::Shutdown;
pub use provider::{ProviderAdapter, ProviderIdentity};
pub use resilience::Deadline;
