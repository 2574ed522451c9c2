//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID, tracing, limits)
//!     → POST /v1/execute → ProviderChain::execute
//!     → JSON ExecuteResult, status reflecting the outcome
//! ```

pub mod server;

pub use server::{build_router, AppState, ExecuteRequest, HttpServer};
