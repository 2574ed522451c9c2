//! HTTP adapter against a local mock backend.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use provider_relay::error::{classify, ErrorCategory};
use provider_relay::provider::{HttpAdapter, ProviderAdapter, ProviderIdentity};
use provider_relay::resilience::{
    CircuitBreakerConfig, RateLimiterConfig, RecoveryPolicy, RecoveryPolicyRegistry,
};
use provider_relay::{Deadline, ProviderFailure};

mod common;
use common::{chain, closed_port, start_programmable_backend};

fn url(addr: SocketAddr, path: &str) -> Url {
    Url::parse(&format!("http://{}{}", addr, path)).unwrap()
}

fn adapter(addr: SocketAddr, key: Option<&str>) -> HttpAdapter {
    HttpAdapter::new("mock", url(addr, "/relay"), key, Some(url(addr, "/health"))).unwrap()
}

fn deadline_ms(ms: u64) -> Deadline {
    Deadline::after(Duration::from_millis(ms))
}

#[tokio::test]
async fn test_success_sends_operation_and_bearer_token() {
    let (addr, seen) =
        start_programmable_backend(|body: Value| async move { (200, json!({"echo": body["payload"]})) })
            .await;

    let value = adapter(addr, Some("k-123"))
        .call("chat", &json!({"q": "hi"}), deadline_ms(5_000))
        .await
        .unwrap();

    assert_eq!(value, json!({"echo": {"q": "hi"}}));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer k-123"));
    assert_eq!(seen[0].body["operation"], "chat");
}

#[tokio::test]
async fn test_status_codes_classified() {
    for (status, expected) in [
        (429, ErrorCategory::RateLimit),
        (401, ErrorCategory::Auth),
        (400, ErrorCategory::InvalidRequest),
        (502, ErrorCategory::Network),
        (504, ErrorCategory::Timeout),
    ] {
        let (addr, _) =
            start_programmable_backend(move |_| async move { (status, json!({"error": "nope"})) })
                .await;
        let failure = adapter(addr, None)
            .call("chat", &Value::Null, deadline_ms(5_000))
            .await
            .unwrap_err();

        assert!(matches!(failure, ProviderFailure::Status { status: s, .. } if s == status));
        assert_eq!(classify(&failure).0, expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_secret_in_error_body_is_sanitized() {
    let (addr, _) = start_programmable_backend(|_| async {
        (401, json!({"error": "invalid api_key=sk-abcdefghijklmnop1234"}))
    })
    .await;

    let chain = chain();
    chain.set_policies(RecoveryPolicyRegistry::with_fallback(RecoveryPolicy::no_retry()));
    chain
        .register_provider(
            ProviderIdentity::new("mock", 1),
            Arc::new(adapter(addr, None)),
            CircuitBreakerConfig::default(),
            RateLimiterConfig::default(),
        )
        .unwrap();

    let result = chain.execute("chat", Value::Null, deadline_ms(5_000)).await;

    assert!(!result.success);
    let attempt = &result.attempts[0];
    assert_eq!(attempt.category, ErrorCategory::Auth);
    assert!(!attempt.message.contains("sk-abcdefghijklmnop1234"), "{}", attempt.message);
}

#[tokio::test]
async fn test_json_echoed_secret_is_sanitized() {
    let (addr, _) = start_programmable_backend(|_| async {
        (
            400,
            json!({"error": "bad request", "echo": {"api_key": "hunter2secretvalue", "password": "p4ssw0rd"}}),
        )
    })
    .await;

    let chain = chain();
    chain
        .register_provider(
            ProviderIdentity::new("mock", 1),
            Arc::new(adapter(addr, None)),
            CircuitBreakerConfig::default(),
            RateLimiterConfig::default(),
        )
        .unwrap();

    let result = chain.execute("chat", Value::Null, deadline_ms(5_000)).await;

    let attempt = &result.attempts[0];
    assert_eq!(attempt.category, ErrorCategory::InvalidRequest);
    assert!(!attempt.message.contains("hunter2secretvalue"), "{}", attempt.message);
    assert!(!attempt.message.contains("p4ssw0rd"), "{}", attempt.message);
    let report = chain.error_report(5);
    assert!(!report.recent[0].message.contains("hunter2secretvalue"));
}

#[tokio::test]
async fn test_refused_connection_is_network() {
    let addr = closed_port().await;
    let failure = adapter(addr, None)
        .call("chat", &Value::Null, deadline_ms(5_000))
        .await
        .unwrap_err();

    assert!(matches!(failure, ProviderFailure::Connection(_)), "{:?}", failure);
    assert_eq!(classify(&failure).0, ErrorCategory::Network);
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let (addr, _) = start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        (200, json!("too late"))
    })
    .await;

    let failure = adapter(addr, None)
        .call("chat", &Value::Null, deadline_ms(200))
        .await
        .unwrap_err();

    assert_eq!(classify(&failure).0, ErrorCategory::Timeout, "{:?}", failure);
}

#[tokio::test]
async fn test_health_check_uses_health_endpoint() {
    let (addr, seen) = start_programmable_backend(|_| async { (200, json!({"status": "ok"})) }).await;
    assert!(adapter(addr, None).health_check(deadline_ms(2_000)).await.unwrap());
    assert_eq!(seen.lock().unwrap().len(), 1);

    let (addr, _) = start_programmable_backend(|_| async { (503, json!({})) }).await;
    let failure = adapter(addr, None)
        .health_check(deadline_ms(2_000))
        .await
        .unwrap_err();
    assert_eq!(classify(&failure).0, ErrorCategory::Network);
}

#[tokio::test]
async fn test_health_check_without_endpoint_is_not_probed() {
    let (addr, seen) = start_programmable_backend(|_| async { (200, json!({})) }).await;
    let adapter = HttpAdapter::new("mock", url(addr, "/relay"), None, None).unwrap();

    assert!(!adapter.health_check(deadline_ms(2_000)).await.unwrap());
    assert!(seen.lock().unwrap().is_empty());
}
