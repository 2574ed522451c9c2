//! Startup orchestration and config reload.
//!
//! # Responsibilities
//! - Build the provider chain from a validated config
//! - Construct an adapter per provider kind
//! - Apply a reloaded config to a running chain

use serde::Serialize;
use std::sync::Arc;
use url::Url;

use crate::chain::{ChainSettings, ProviderChain};
use crate::config::validation::recovery_category;
use crate::config::{ProviderConfig, ProviderKind, RelayConfig};
use crate::error::RelayError;
use crate::provider::{
    HttpAdapter, OfflineAdapter, ProviderAdapter, ProviderIdentity, ProviderSettings,
};
use crate::resilience::RecoveryPolicyRegistry;

/// Names affected by a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
}

pub fn build_chain(config: &RelayConfig) -> Result<ProviderChain, RelayError> {
    let chain = ProviderChain::new(ChainSettings {
        default_strategy: config.routing.default_strategy,
        min_score: config.routing.min_score,
        health: config.health.window(),
        seed: config.routing.seed,
    });
    chain.set_policies(recovery_registry(config));

    for provider in &config.providers {
        register(&chain, provider, config)?;
    }

    tracing::info!(
        providers = chain.len(),
        strategy = %chain.default_strategy(),
        "Provider chain ready"
    );
    Ok(chain)
}

/// Built-in recovery policies with the config's overrides applied.
pub fn recovery_registry(config: &RelayConfig) -> RecoveryPolicyRegistry {
    let mut registry = RecoveryPolicyRegistry::default();
    for (name, policy) in &config.recovery {
        match recovery_category(name) {
            Some(category) => registry.set(category, *policy),
            None => tracing::warn!(category = %name, "Ignoring recovery policy for unknown category"),
        }
    }
    registry
}

/// Apply `new` to a chain built from `old`.
///
/// Providers whose definition is unchanged keep their breaker, limiter and
/// health state. Routing score threshold, seed and health window sizes only
/// take effect on restart.
pub fn apply_reload(
    chain: &ProviderChain,
    old: &RelayConfig,
    new: &RelayConfig,
) -> Result<ReloadSummary, RelayError> {
    let mut summary = ReloadSummary::default();

    chain.set_policies(recovery_registry(new));
    chain.set_default_strategy(new.routing.default_strategy);

    for provider in &old.providers {
        if !new.providers.iter().any(|p| p.name == provider.name) {
            chain.deregister(&provider.name)?;
            summary.removed.push(provider.name.clone());
        }
    }

    for provider in &new.providers {
        match old.providers.iter().find(|p| p.name == provider.name) {
            Some(previous) if previous == provider => {}
            Some(_) => {
                register(chain, provider, new)?;
                summary.updated.push(provider.name.clone());
            }
            None => {
                register(chain, provider, new)?;
                summary.added.push(provider.name.clone());
            }
        }
    }

    if old.routing.min_score != new.routing.min_score
        || old.routing.seed != new.routing.seed
        || old.health.window_size != new.health.window_size
        || old.health.max_recent_errors != new.health.max_recent_errors
    {
        tracing::warn!("Routing threshold, seed and health window changes apply after restart");
    }

    tracing::info!(
        added = summary.added.len(),
        updated = summary.updated.len(),
        removed = summary.removed.len(),
        "Configuration reloaded"
    );
    Ok(summary)
}

fn register(
    chain: &ProviderChain,
    provider: &ProviderConfig,
    config: &RelayConfig,
) -> Result<(), RelayError> {
    let identity = ProviderIdentity::new(&provider.name, provider.priority)
        .with_capabilities(provider.capabilities.iter().cloned());

    match provider.kind {
        ProviderKind::Offline => chain.register_offline(identity, Arc::new(OfflineAdapter::passthrough())),
        ProviderKind::Http => chain.register_with_settings(
            identity,
            http_adapter(provider)?,
            ProviderSettings {
                breaker: provider.breaker.into(),
                rate_limit: provider.rate_limit.into(),
                health: config.health.window(),
                request_timeout: provider.request_timeout(),
            },
        ),
    }
}

fn http_adapter(provider: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, RelayError> {
    let invalid = |reason: String| RelayError::InvalidProvider {
        name: provider.name.clone(),
        reason,
    };

    let endpoint = provider
        .endpoint
        .as_deref()
        .ok_or_else(|| invalid("http provider needs an endpoint".to_string()))?;
    let endpoint = Url::parse(endpoint).map_err(|e| invalid(format!("endpoint: {}", e)))?;
    let health_url = provider
        .health_endpoint
        .as_deref()
        .map(Url::parse)
        .transpose()
        .map_err(|e| invalid(format!("health_endpoint: {}", e)))?;

    let api_key = match &provider.api_key_env {
        Some(var) => match std::env::var(var) {
            Ok(key) => Some(key),
            Err(_) => {
                tracing::warn!(provider = %provider.name, env = %var, "API key variable not set, calling without credentials");
                None
            }
        },
        None => None,
    };

    let adapter = HttpAdapter::new(&provider.name, endpoint, api_key.as_deref(), health_url)?;
    Ok(Arc::new(adapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::error::ErrorCategory;
    use crate::load_balancer::Strategy;

    const BASE: &str = r#"
        [[providers]]
        name = "primary"
        priority = 5
        endpoint = "http://127.0.0.1:9/relay"

        [[providers]]
        name = "secondary"
        priority = 3
        endpoint = "http://127.0.0.1:9/relay"

        [[providers]]
        name = "offline"
        kind = "offline"
        priority = 0
    "#;

    #[tokio::test]
    async fn test_build_chain_from_config() {
        let config = parse_config(
            &format!("[recovery.auth]\nretryable = true\nmax_retries_same_provider = 1\n{}", BASE),
        )
        .unwrap();
        let chain = build_chain(&config).unwrap();

        assert_eq!(chain.len(), 3);
        assert!(chain.provider("offline").unwrap().is_terminal());
        assert!(chain.policies().policy_for(ErrorCategory::Auth).retryable);
        assert!(!chain.policies().policy_for(ErrorCategory::InvalidRequest).retryable);
    }

    #[tokio::test]
    async fn test_reload_only_touches_changed_providers() {
        let old = parse_config(BASE).unwrap();
        let chain = build_chain(&old).unwrap();
        let secondary_before = chain.provider("secondary").unwrap();
        secondary_before.breaker().on_failure();

        let new = parse_config(
            r#"
            [routing]
            default_strategy = "round_robin"

            [[providers]]
            name = "primary"
            priority = 7
            endpoint = "http://127.0.0.1:9/relay"

            [[providers]]
            name = "secondary"
            priority = 3
            endpoint = "http://127.0.0.1:9/relay"

            [[providers]]
            name = "backup"
            endpoint = "http://127.0.0.1:9/backup"
            "#,
        )
        .unwrap();

        let summary = apply_reload(&chain, &old, &new).unwrap();
        assert_eq!(summary.added, vec!["backup"]);
        assert_eq!(summary.updated, vec!["primary"]);
        assert_eq!(summary.removed, vec!["offline"]);

        assert_eq!(chain.default_strategy(), Strategy::RoundRobin);
        assert_eq!(chain.provider("primary").unwrap().identity().priority, 7);
        let secondary_after = chain.provider("secondary").unwrap();
        assert!(Arc::ptr_eq(&secondary_before, &secondary_after));
        assert_eq!(secondary_after.breaker().consecutive_failures(), 1);
    }
}
