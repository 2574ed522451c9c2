//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt against a provider:
//!     → circuit_breaker.rs (gate: is the provider allowed traffic?)
//!     → rate_limit.rs (gate: token available before the deadline?)
//!     → timeouts.rs (bound the adapter call by the caller's deadline)
//!     → On failure: retries.rs (policy for the category)
//!         → backoff.rs (jittered delay before a same-provider retry)
//! ```
//!
//! # Design Decisions
//! - Deadlines are non-negotiable; every suspension point is bounded
//! - Breaker, limiter and health are per provider, each with its own lock
//! - Jittered backoff prevents synchronized retry storms

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Permit};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retries::{RecoveryPolicy, RecoveryPolicyRegistry};
pub use timeouts::Deadline;
