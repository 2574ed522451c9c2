//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → RelayConfig
//!     → lifecycle/startup.rs builds the provider chain from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and validates
//!     → startup.rs applies the difference to the running chain
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - An invalid reload is rejected whole; the running config stays

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerSettings, HealthSettings, LogFormat, ObservabilityConfig, ProbeConfig,
    ProviderConfig, ProviderKind, RateLimitSettings, RelayConfig, RoutingConfig, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
