//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode, routing::any, Json, Router};
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

use provider_relay::chain::{ChainSettings, ProviderChain};
use provider_relay::provider::{ProviderAdapter, ProviderIdentity, ProviderSettings};
use provider_relay::resilience::{CircuitBreakerConfig, RateLimiterConfig};
use provider_relay::{Deadline, ProviderFailure};

/// One scripted adapter response.
#[derive(Debug, Clone)]
pub enum Step {
    Ok(Value),
    Fail(ProviderFailure),
    /// Answer `Ok(value)` after a delay.
    Slow(Duration, Value),
    /// Never answer.
    Hang,
}

/// Adapter replaying a script, then repeating its final step forever.
pub struct ScriptedAdapter {
    steps: Mutex<VecDeque<Step>>,
    then: Step,
    calls: AtomicU32,
}

impl ScriptedAdapter {
    pub fn always(step: Step) -> Arc<Self> {
        Self::script(Vec::new(), step)
    }

    pub fn script(steps: Vec<Step>, then: Step) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            then,
            calls: AtomicU32::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn call(
        &self,
        _operation: &str,
        _payload: &Value,
        _deadline: Deadline,
    ) -> Result<Value, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.then.clone());

        match step {
            Step::Ok(value) => Ok(value),
            Step::Fail(failure) => Err(failure),
            Step::Slow(delay, value) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Step::Hang => std::future::pending().await,
        }
    }
}

pub fn chain() -> ProviderChain {
    ProviderChain::new(ChainSettings {
        seed: Some(17),
        ..ChainSettings::default()
    })
}

pub fn register(chain: &ProviderChain, name: &str, priority: u32, adapter: Arc<ScriptedAdapter>) {
    chain
        .register_provider(
            ProviderIdentity::new(name, priority),
            adapter,
            CircuitBreakerConfig::default(),
            RateLimiterConfig::default(),
        )
        .unwrap();
}

pub fn register_with(
    chain: &ProviderChain,
    identity: ProviderIdentity,
    adapter: Arc<ScriptedAdapter>,
    settings: ProviderSettings,
) {
    chain.register_with_settings(identity, adapter, settings).unwrap();
}

pub fn deadline_secs(secs: u64) -> Deadline {
    Deadline::after(Duration::from_secs(secs))
}

/// What the mock backend saw for one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

type Responder = dyn Fn(Value) -> Pin<Box<dyn Future<Output = (u16, Value)> + Send>> + Send + Sync;

#[derive(Clone)]
struct MockState {
    respond: Arc<Responder>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

async fn handle(State(state): State<MockState>, headers: HeaderMap, body: Bytes) -> (StatusCode, Json<Value>) {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.seen.lock().unwrap().push(SeenRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: body.clone(),
    });
    let (status, reply) = (state.respond)(body).await;
    (StatusCode::from_u16(status).unwrap(), Json(reply))
}

/// Start a programmable JSON backend on an ephemeral port.
///
/// Returns its address and the log of requests it received.
pub async fn start_programmable_backend<F, Fut>(f: F) -> (SocketAddr, Arc<Mutex<Vec<SeenRequest>>>)
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, Value)> + Send + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let respond: Arc<Responder> = Arc::new(move |body| Box::pin(f(body)));
    let state = MockState {
        respond,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/{*path}", any(handle))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (addr, seen)
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
