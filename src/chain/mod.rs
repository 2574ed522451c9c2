//! Provider chain: ordered fallback across providers.
//!
//! # Data Flow
//! ```text
//! execute(operation, payload, deadline)
//!     → Capable providers, split into regular and terminal
//!     → LoadBalancer orders regular providers; terminal ones appended last
//!     → For each candidate:
//!         → breaker.admit()          (skip: ProviderUnavailable)
//!         → limiter.acquire(1)       (deny: RateLimit)
//!         → adapter.call()           (bounded by deadline and request timeout)
//!         → classify → breaker/health update → policy: retry same or advance
//!     → ExecuteResult (success with value, or the full attempt trail)
//! ```
//!
//! # Design Decisions
//! - Per-provider state lives in the chain's map; no globals
//! - The caller's deadline cancels the in-flight call without blaming the provider
//! - Adapter calls run in their own task so a panic becomes an Unknown failure
//! - Recovery policies are swapped atomically on config reload

pub mod result;
pub mod snapshot;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::time::{self, Instant};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{ErrorRecord, ProviderFailure, RelayError};
use crate::health::HealthConfig;
use crate::load_balancer::{sort_by_priority, BestPerformance, LoadBalancer, Strategy};
use crate::observability::metrics::{self, RequestOutcome};
use crate::provider::{Provider, ProviderAdapter, ProviderIdentity, ProviderSettings};
use crate::resilience::{
    CircuitBreakerConfig, Deadline, Permit, RateLimiterConfig, RecoveryPolicyRegistry,
};

pub use result::{AttemptRecord, ExecuteResult};
pub use snapshot::{ErrorReport, ProviderHealthSnapshot};

/// Chain-wide settings fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainSettings {
    pub default_strategy: Strategy,
    /// Minimum availability score for best-performance ordering.
    pub min_score: f64,
    /// Health window settings for providers registered without explicit ones.
    pub health: HealthConfig,
    /// Seed for weighted-random ordering; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            default_strategy: Strategy::Priority,
            min_score: BestPerformance::DEFAULT_MIN_SCORE,
            health: HealthConfig::default(),
            seed: None,
        }
    }
}

/// How one provider's turn in the chain ended.
enum Turn {
    Served(Value),
    Failed(AttemptRecord),
    /// The caller's deadline passed; the chain stops.
    Cancelled(AttemptRecord),
}

enum Invocation {
    Failed(ProviderFailure),
    /// The call deadline fired before the adapter answered.
    Expired,
}

pub struct ProviderChain {
    providers: DashMap<String, Arc<Provider>>,
    policies: ArcSwap<RecoveryPolicyRegistry>,
    balancer: LoadBalancer,
    default_strategy: RwLock<Strategy>,
    health: HealthConfig,
}

impl Default for ProviderChain {
    fn default() -> Self {
        Self::new(ChainSettings::default())
    }
}

impl ProviderChain {
    pub fn new(settings: ChainSettings) -> Self {
        let balancer = match settings.seed {
            Some(seed) => LoadBalancer::with_seed(settings.min_score, seed),
            None => LoadBalancer::new(settings.min_score),
        };
        Self {
            providers: DashMap::new(),
            policies: ArcSwap::from_pointee(RecoveryPolicyRegistry::default()),
            balancer,
            default_strategy: RwLock::new(settings.default_strategy),
            health: settings.health,
        }
    }

    /// Register (or replace) a provider by name. Replacing resets its state.
    pub fn register_provider(
        &self,
        identity: ProviderIdentity,
        adapter: Arc<dyn ProviderAdapter>,
        breaker: CircuitBreakerConfig,
        rate_limit: RateLimiterConfig,
    ) -> Result<(), RelayError> {
        self.register_with_settings(
            identity,
            adapter,
            ProviderSettings {
                breaker,
                rate_limit,
                health: self.health,
                request_timeout: None,
            },
        )
    }

    pub fn register_with_settings(
        &self,
        identity: ProviderIdentity,
        adapter: Arc<dyn ProviderAdapter>,
        settings: ProviderSettings,
    ) -> Result<(), RelayError> {
        identity.validate()?;
        let limits = settings.rate_limit;
        if !(limits.capacity.is_finite() && limits.capacity >= 1.0)
            || !(limits.refill_rate.is_finite() && limits.refill_rate >= 0.0)
        {
            return Err(RelayError::InvalidProvider {
                name: identity.name,
                reason: "rate limit capacity must be at least 1 and refill rate non-negative, both finite"
                    .to_string(),
            });
        }
        if settings.breaker.failure_threshold == 0 || settings.breaker.success_threshold == 0 {
            return Err(RelayError::InvalidProvider {
                name: identity.name,
                reason: "breaker thresholds must be positive".to_string(),
            });
        }
        self.insert(Provider::new(identity, adapter, settings));
        Ok(())
    }

    /// Register a terminal fallback, tried after every regular provider.
    pub fn register_offline(
        &self,
        identity: ProviderIdentity,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Result<(), RelayError> {
        identity.validate()?;
        self.insert(Provider::offline(identity, adapter, self.health));
        Ok(())
    }

    fn insert(&self, provider: Provider) {
        let name = provider.name().to_string();
        let terminal = provider.is_terminal();
        let replaced = self.providers.insert(name.clone(), Arc::new(provider)).is_some();
        tracing::info!(provider = %name, terminal, replaced, "Provider registered");
    }

    pub fn deregister(&self, name: &str) -> Result<(), RelayError> {
        match self.providers.remove(name) {
            Some(_) => {
                tracing::info!(provider = %name, "Provider deregistered");
                Ok(())
            }
            None => Err(RelayError::UnknownProvider(name.to_string())),
        }
    }

    pub fn provider(&self, name: &str) -> Option<Arc<Provider>> {
        self.providers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of registered providers, sorted by name.
    pub fn providers(&self) -> Vec<Arc<Provider>> {
        let mut providers: Vec<Arc<Provider>> = self
            .providers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn set_policies(&self, policies: RecoveryPolicyRegistry) {
        self.policies.store(Arc::new(policies));
    }

    pub fn policies(&self) -> Arc<RecoveryPolicyRegistry> {
        self.policies.load_full()
    }

    pub fn set_default_strategy(&self, strategy: Strategy) {
        *self
            .default_strategy
            .write()
            .unwrap_or_else(PoisonError::into_inner) = strategy;
    }

    pub fn default_strategy(&self) -> Strategy {
        *self
            .default_strategy
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn execute(&self, operation: &str, payload: Value, deadline: Deadline) -> ExecuteResult {
        self.execute_with_strategy(operation, payload, deadline, self.default_strategy())
            .await
    }

    pub async fn execute_with_strategy(
        &self,
        operation: &str,
        payload: Value,
        deadline: Deadline,
        strategy: Strategy,
    ) -> ExecuteResult {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "execute",
            correlation_id = %correlation_id,
            operation = %operation,
            strategy = %strategy,
        );
        self.run(operation, Arc::new(payload), deadline, strategy, correlation_id)
            .instrument(span)
            .await
    }

    /// Candidates for `operation`, in the order they will be tried.
    pub fn candidates(&self, operation: &str, strategy: Strategy) -> Vec<Arc<Provider>> {
        let (mut terminal, regular): (Vec<_>, Vec<_>) = self
            .providers()
            .into_iter()
            .filter(|p| p.identity().supports(operation))
            .partition(|p| p.is_terminal());

        let mut ordered = self.balancer.order(&regular, strategy);
        sort_by_priority(&mut terminal);
        ordered.extend(terminal);
        ordered
    }

    async fn run(
        &self,
        operation: &str,
        payload: Arc<Value>,
        deadline: Deadline,
        strategy: Strategy,
        correlation_id: Uuid,
    ) -> ExecuteResult {
        let started = Instant::now();
        let candidates = self.candidates(operation, strategy);
        tracing::debug!(
            candidates = ?candidates.iter().map(|p| p.name()).collect::<Vec<_>>(),
            "Chain ordered"
        );

        let mut attempts = Vec::new();
        let mut deadline_exceeded = false;

        for provider in &candidates {
            if deadline.is_expired() {
                deadline_exceeded = true;
                break;
            }
            match self
                .take_turn(provider, operation, &payload, deadline, correlation_id)
                .await
            {
                Turn::Served(value) => {
                    metrics::record_request(RequestOutcome::Success);
                    tracing::info!(
                        provider = %provider.name(),
                        failed_providers = attempts.len(),
                        "Request served"
                    );
                    return ExecuteResult {
                        success: true,
                        value: Some(value),
                        provider_used: Some(provider.name().to_string()),
                        attempts,
                        correlation_id,
                        deadline_exceeded: false,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                        user_message: None,
                    };
                }
                Turn::Failed(attempt) => attempts.push(attempt),
                Turn::Cancelled(attempt) => {
                    attempts.push(attempt);
                    deadline_exceeded = true;
                    break;
                }
            }
        }

        let outcome = if deadline_exceeded {
            RequestOutcome::DeadlineExceeded
        } else if candidates.is_empty() {
            RequestOutcome::NoCandidates
        } else {
            RequestOutcome::Exhausted
        };
        metrics::record_request(outcome);
        tracing::warn!(
            outcome = outcome.as_str(),
            attempts = attempts.len(),
            "All providers failed"
        );

        ExecuteResult {
            success: false,
            value: None,
            provider_used: None,
            user_message: Some(result::failure_message(&attempts, deadline_exceeded)),
            attempts,
            correlation_id,
            deadline_exceeded,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// One provider's turn: gate, call, and retry per policy.
    async fn take_turn(
        &self,
        provider: &Provider,
        operation: &str,
        payload: &Arc<Value>,
        deadline: Deadline,
        correlation_id: Uuid,
    ) -> Turn {
        let name = provider.name();
        let policies = self.policies.load_full();
        let mut retries = 0u32;
        let mut last_failure: Option<ErrorRecord> = None;

        loop {
            // Terminal providers bypass the breaker and limiter.
            let permit = if provider.is_terminal() {
                None
            } else {
                let Some(permit) = provider.breaker().admit() else {
                    // A retry blocked by the breaker our own failure tripped
                    // reports that failure, not the rejection.
                    let record = match last_failure {
                        Some(record) => record,
                        None => self.note_skip(provider, ProviderFailure::CircuitOpen, correlation_id),
                    };
                    tracing::debug!(provider = %name, "Circuit open, skipping provider");
                    return Turn::Failed(AttemptRecord::from_error(&record, retries));
                };
                if !provider.limiter().acquire(1.0, deadline).await {
                    provider.breaker().release(permit);
                    let record = self.note_skip(provider, ProviderFailure::RateLimited, correlation_id);
                    tracing::info!(provider = %name, "Rate limited, advancing");
                    return Turn::Failed(AttemptRecord::from_error(&record, retries));
                }
                Some(permit)
            };

            let call_deadline = match provider.request_timeout() {
                Some(limit) => deadline.cap(limit),
                None => deadline,
            };
            let call_started = Instant::now();
            let outcome = invoke(provider, operation, payload, call_deadline).await;
            let elapsed = call_started.elapsed();
            metrics::record_attempt_duration(name, elapsed);

            let failure = match outcome {
                Ok(value) => {
                    if let Some(permit) = permit {
                        provider.breaker().record_success(permit);
                    }
                    provider.health().record_success(elapsed);
                    return Turn::Served(value);
                }
                Err(Invocation::Expired) if deadline.is_expired() => {
                    return Turn::Cancelled(self.note_cancelled(provider, permit, retries, correlation_id));
                }
                Err(Invocation::Expired) => ProviderFailure::Timeout(format!(
                    "no response within {}ms",
                    elapsed.as_millis()
                )),
                Err(Invocation::Failed(ProviderFailure::Timeout(_))) if deadline.is_expired() => {
                    return Turn::Cancelled(self.note_cancelled(provider, permit, retries, correlation_id));
                }
                Err(Invocation::Failed(failure)) => failure,
            };

            let record = ErrorRecord::new(name, &failure, correlation_id);
            if let Some(permit) = permit {
                provider.breaker().record_failure(permit);
            }
            provider.health().record_failure(record.category);
            provider.health().record_error(record.clone());
            metrics::record_attempt(name, record.category);

            let policy = policies.policy_for(record.category);
            if policy.allows_retry(retries) {
                let delay = policy.delay_for(retries);
                if deadline.allows_wait(delay) {
                    tracing::info!(
                        provider = %name,
                        category = %record.category,
                        retry = retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying provider"
                    );
                    time::sleep(delay).await;
                    retries += 1;
                    last_failure = Some(record);
                    continue;
                }
                tracing::debug!(provider = %name, "Backoff would pass the deadline, advancing");
            }

            tracing::info!(
                provider = %name,
                category = %record.category,
                severity = %record.severity,
                retries,
                "Provider failed, advancing"
            );
            return Turn::Failed(AttemptRecord::from_error(&record, retries));
        }
    }

    /// Record a gate rejection. Not counted against breaker or health window.
    fn note_skip(
        &self,
        provider: &Provider,
        failure: ProviderFailure,
        correlation_id: Uuid,
    ) -> ErrorRecord {
        let record = ErrorRecord::new(provider.name(), &failure, correlation_id);
        provider.health().record_error(record.clone());
        metrics::record_attempt(provider.name(), record.category);
        record
    }

    /// The caller's deadline cut the call short; release any trial slot.
    fn note_cancelled(
        &self,
        provider: &Provider,
        permit: Option<Permit>,
        retries: u32,
        correlation_id: Uuid,
    ) -> AttemptRecord {
        if let Some(permit) = permit {
            provider.breaker().release(permit);
        }
        tracing::warn!(provider = %provider.name(), "Deadline exceeded during call");
        let failure = ProviderFailure::Timeout("caller deadline exceeded".to_string());
        AttemptRecord::from_error(&ErrorRecord::new(provider.name(), &failure, correlation_id), retries)
    }

    pub fn health_snapshot(&self) -> BTreeMap<String, ProviderHealthSnapshot> {
        self.providers()
            .iter()
            .map(|p| (p.name().to_string(), ProviderHealthSnapshot::of(p)))
            .collect()
    }

    /// Aggregate of every provider's retained error records.
    pub fn error_report(&self, limit: usize) -> ErrorReport {
        ErrorReport::build(
            self.providers()
                .iter()
                .flat_map(|p| p.health().recent_errors()),
            limit,
        )
    }
}

/// Run the adapter in its own task, bounded by `deadline`.
async fn invoke(
    provider: &Provider,
    operation: &str,
    payload: &Arc<Value>,
    deadline: Deadline,
) -> Result<Value, Invocation> {
    let adapter = Arc::clone(provider.adapter());
    let operation = operation.to_string();
    let payload = Arc::clone(payload);
    let mut handle =
        tokio::spawn(async move { adapter.call(&operation, &payload, deadline).await });

    match time::timeout_at(deadline.instant(), &mut handle).await {
        Ok(Ok(result)) => result.map_err(Invocation::Failed),
        Ok(Err(join_error)) => {
            let reason = if join_error.is_panic() {
                "adapter panicked"
            } else {
                "adapter task cancelled"
            };
            tracing::error!(provider = %provider.name(), reason, "Adapter task failed");
            Err(Invocation::Failed(ProviderFailure::Internal(reason.to_string())))
        }
        Err(_) => {
            handle.abort();
            Err(Invocation::Expired)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::provider::OfflineAdapter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Failing {
        failure: ProviderFailure,
        calls: AtomicU32,
    }

    impl Failing {
        fn new(failure: ProviderFailure) -> Arc<Self> {
            Arc::new(Self {
                failure,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl ProviderAdapter for Failing {
        async fn call(&self, _: &str, _: &Value, _: Deadline) -> Result<Value, ProviderFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.failure.clone())
        }
    }

    struct Panicking;

    #[async_trait]
    impl ProviderAdapter for Panicking {
        async fn call(&self, _: &str, _: &Value, _: Deadline) -> Result<Value, ProviderFailure> {
            panic!("adapter bug");
        }
    }

    fn chain() -> ProviderChain {
        ProviderChain::new(ChainSettings::default())
    }

    fn register(chain: &ProviderChain, name: &str, priority: u32, adapter: Arc<dyn ProviderAdapter>) {
        chain
            .register_provider(
                ProviderIdentity::new(name, priority),
                adapter,
                CircuitBreakerConfig::default(),
                RateLimiterConfig::default(),
            )
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_counted_per_provider() {
        let chain = chain();
        let flaky = Failing::new(ProviderFailure::Connection("refused".into()));
        register(&chain, "flaky", 1, flaky.clone());

        let result = chain
            .execute("chat", json!({}), Deadline::after(Duration::from_secs(30)))
            .await;

        assert!(!result.success);
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].category, ErrorCategory::Network);
        assert_eq!(result.attempts[0].retries, 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert!(result.user_message.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_adapter_is_unknown_critical() {
        let chain = chain();
        chain.set_policies(RecoveryPolicyRegistry::with_fallback(
            crate::resilience::RecoveryPolicy::no_retry(),
        ));
        register(&chain, "buggy", 2, Arc::new(Panicking));
        chain
            .register_offline(ProviderIdentity::new("offline", 0), Arc::new(OfflineAdapter::passthrough()))
            .unwrap();

        let result = chain
            .execute("chat", json!({"q": "hi"}), Deadline::after(Duration::from_secs(5)))
            .await;

        assert!(result.success);
        assert_eq!(result.provider_used.as_deref(), Some("offline"));
        let attempt = result.attempt_for("buggy").unwrap();
        assert_eq!(attempt.category, ErrorCategory::Unknown);
        assert_eq!(attempt.severity, crate::error::ErrorSeverity::Critical);
    }

    #[tokio::test]
    async fn test_replacing_provider_resets_state() {
        let chain = chain();
        register(&chain, "a", 1, Failing::new(ProviderFailure::status(500, "boom")));
        let before = chain.provider("a").unwrap();
        before.breaker().on_failure();
        before.health().record_failure(ErrorCategory::Network);

        register(&chain, "a", 1, Arc::new(OfflineAdapter::passthrough()));
        let after = chain.provider("a").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(after.breaker().consecutive_failures(), 0);
        assert_eq!(after.health().window_len(), 0);
    }

    #[test]
    fn test_invalid_registration_rejected() {
        let chain = chain();
        let result = chain.register_provider(
            ProviderIdentity::new("a", 1),
            Arc::new(OfflineAdapter::passthrough()),
            CircuitBreakerConfig::default(),
            RateLimiterConfig {
                capacity: 0.0,
                refill_rate: 1.0,
            },
        );
        assert!(matches!(result, Err(RelayError::InvalidProvider { .. })));

        for (capacity, refill_rate) in [(f64::NAN, 1.0), (5.0, f64::NAN), (f64::INFINITY, 1.0)] {
            let result = chain.register_provider(
                ProviderIdentity::new("a", 1),
                Arc::new(OfflineAdapter::passthrough()),
                CircuitBreakerConfig::default(),
                RateLimiterConfig {
                    capacity,
                    refill_rate,
                },
            );
            assert!(matches!(result, Err(RelayError::InvalidProvider { .. })));
        }
        assert!(chain.is_empty());
        assert!(matches!(chain.deregister("a"), Err(RelayError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let chain = chain();
        let result = chain
            .execute("chat", Value::Null, Deadline::after(Duration::from_secs(1)))
            .await;
        assert!(!result.success);
        assert!(result.attempts.is_empty());
        assert!(!result.deadline_exceeded);
    }
}
