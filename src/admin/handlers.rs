use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::chain::{ErrorReport, ProviderHealthSnapshot};
use crate::http::server::AppState;
use crate::load_balancer::Strategy;
use crate::resilience::CircuitState;

const DEFAULT_ERROR_LIMIT: usize = 50;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub providers: usize,
    pub open_breakers: Vec<String>,
    pub default_strategy: Strategy,
}

#[derive(Debug, Deserialize)]
pub struct ErrorsQuery {
    pub limit: Option<usize>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let providers = state.chain.providers();
    let open_breakers: Vec<String> = providers
        .iter()
        .filter(|p| !p.is_terminal() && p.breaker().state() != CircuitState::Closed)
        .map(|p| p.name().to_string())
        .collect();

    let regular = providers.iter().filter(|p| !p.is_terminal()).count();
    let status = if providers.is_empty() {
        "no_providers"
    } else if regular > 0 && open_breakers.len() == regular {
        "degraded"
    } else {
        "operational"
    };

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        uptime_secs: state.started_at.elapsed().as_secs(),
        providers: providers.len(),
        open_breakers,
        default_strategy: state.chain.default_strategy(),
    })
}

pub async fn get_health(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, ProviderHealthSnapshot>> {
    Json(state.chain.health_snapshot())
}

pub async fn get_provider_health(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProviderHealthSnapshot>, StatusCode> {
    state
        .chain
        .provider(&name)
        .map(|p| Json(ProviderHealthSnapshot::of(&p)))
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn get_errors(
    State(state): State<AppState>,
    Query(query): Query<ErrorsQuery>,
) -> Json<ErrorReport> {
    Json(state.chain.error_report(query.limit.unwrap_or(DEFAULT_ERROR_LIMIT)))
}
