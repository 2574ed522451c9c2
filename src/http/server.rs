//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the public relay API
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Translate execute requests into chain executions
//! - Serve until the shutdown future resolves

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::chain::ProviderChain;
use crate::config::{AdminConfig, ServerConfig};
use crate::load_balancer::Strategy;
use crate::resilience::Deadline;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<ProviderChain>,
    pub server: Arc<ServerConfig>,
    pub admin: Arc<AdminConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(chain: Arc<ProviderChain>, server: ServerConfig, admin: AdminConfig) -> Self {
        Self {
            chain,
            server: Arc::new(server),
            admin: Arc::new(admin),
            started_at: Instant::now(),
        }
    }
}

/// Body of `POST /v1/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub operation: String,
    #[serde(default)]
    pub payload: Value,
    /// Caller deadline; clamped to the server maximum.
    pub timeout_ms: Option<u64>,
    pub strategy: Option<Strategy>,
}

/// HTTP server for the relay API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    // The chain enforces the caller's deadline; this only guards against a stuck handler.
    let hard_timeout = state.server.max_timeout() + Duration::from_secs(5);
    let body_limit = state.server.max_body_bytes;

    Router::new()
        .route("/v1/execute", post(execute_handler))
        .route("/healthz", get(liveness_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(hard_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn liveness_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn execute_handler(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Response {
    if request.operation.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "operation must not be empty" })),
        )
            .into_response();
    }

    let timeout = request
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| state.server.default_timeout())
        .min(state.server.max_timeout());
    let deadline = Deadline::after(timeout);
    let strategy = request
        .strategy
        .unwrap_or_else(|| state.chain.default_strategy());

    let result = state
        .chain
        .execute_with_strategy(&request.operation, request.payload, deadline, strategy)
        .await;

    let status = if result.success {
        StatusCode::OK
    } else if result.deadline_exceeded {
        StatusCode::GATEWAY_TIMEOUT
    } else if result.attempts.is_empty() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::BAD_GATEWAY
    };

    (status, Json(result)).into_response()
}
