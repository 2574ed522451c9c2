//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build provider chain → Start background tasks → Bind listeners
//!
//! Reload (startup.rs):
//!     New config → Swap recovery policies → Re-register changed providers
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Broadcast → Listeners drain, prober and watcher stop
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when the chain is ready)
//! - A reload never touches providers whose settings did not change

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{apply_reload, build_chain, ReloadSummary};
