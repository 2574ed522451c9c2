//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Passive (monitor.rs):
//!     Chain attempt completes
//!     → record_success(latency) / record_failure(category)
//!     → Rolling window → availability score, latency percentiles
//!
//! Active (active.rs):
//!     Periodic timer
//!     → adapter.health_check() per provider
//!     → Same window as passive observations
//! ```
//!
//! # Design Decisions
//! - Health is per provider, never aggregated across providers
//! - Score moves gradually so one outcome cannot flip routing decisions
//! - Probes feed the health window only; the breaker reacts to real traffic

pub mod active;
pub mod monitor;

pub use active::HealthProber;
pub use monitor::{HealthConfig, HealthMonitor, LatencyPercentiles, ProviderTotals};
