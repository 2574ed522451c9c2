//! Configuration validation.
//!
//! Semantic checks only; serde already rejected malformed syntax. Every
//! problem is reported, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::{ProviderConfig, ProviderKind, RelayConfig};
use crate::error::ErrorCategory;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Category named by a `[recovery.<name>]` key.
pub fn recovery_category(name: &str) -> Option<ErrorCategory> {
    ErrorCategory::ALL
        .into_iter()
        .find(|category| category.as_str() == name)
}

pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "server.bind_address", &config.server.bind_address);
    if config.server.default_timeout_ms == 0 {
        errors.push(ValidationError::new("server.default_timeout_ms", "must be positive"));
    }
    if config.server.max_timeout_ms < config.server.default_timeout_ms {
        errors.push(ValidationError::new(
            "server.max_timeout_ms",
            "must not be below default_timeout_ms",
        ));
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
        }
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("must be one of {}", LOG_LEVELS.join(", ")),
        ));
    }
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if !(0.0..=1.0).contains(&config.routing.min_score) {
        errors.push(ValidationError::new("routing.min_score", "must be within [0, 1]"));
    }

    if config.health.window_size == 0 {
        errors.push(ValidationError::new("health.window_size", "must be positive"));
    }
    if config.health.probe.enabled {
        if config.health.probe.interval_secs == 0 {
            errors.push(ValidationError::new("health.probe.interval_secs", "must be positive"));
        }
        if config.health.probe.timeout_ms == 0 {
            errors.push(ValidationError::new("health.probe.timeout_ms", "must be positive"));
        }
    }

    for (name, policy) in &config.recovery {
        let field = format!("recovery.{}", name);
        if recovery_category(name).is_none() {
            errors.push(ValidationError::new(&field, "unknown error category"));
        }
        if policy.backoff_multiplier < 1.0 {
            errors.push(ValidationError::new(
                format!("{}.backoff_multiplier", field),
                "must be a finite number of at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&policy.jitter_fraction) {
            errors.push(ValidationError::new(
                format!("{}.jitter_fraction", field),
                "must be within [0, 1]",
            ));
        }
        if policy.max_delay < policy.base_delay {
            errors.push(ValidationError::new(
                format!("{}.max_delay", field),
                "must not be below base_delay",
            ));
        }
    }

    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let field = format!("providers[{}]", i);
        if provider.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{}.name", field), "must not be empty"));
        } else if !seen.insert(provider.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{}.name", field),
                format!("duplicate provider '{}'", provider.name),
            ));
        }
        validate_provider(&mut errors, &field, provider);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_provider(errors: &mut Vec<ValidationError>, field: &str, provider: &ProviderConfig) {
    if provider.kind == ProviderKind::Http {
        match &provider.endpoint {
            Some(endpoint) => check_url(errors, &format!("{}.endpoint", field), endpoint),
            None => errors.push(ValidationError::new(
                format!("{}.endpoint", field),
                "required for http providers",
            )),
        }
        if let Some(health) = &provider.health_endpoint {
            check_url(errors, &format!("{}.health_endpoint", field), health);
        }
    }

    if provider.capabilities.iter().any(|c| c.trim().is_empty()) {
        errors.push(ValidationError::new(
            format!("{}.capabilities", field),
            "tags must not be empty",
        ));
    }
    if provider.request_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            format!("{}.request_timeout_ms", field),
            "must be positive",
        ));
    }
    if provider.breaker.failure_threshold == 0 || provider.breaker.success_threshold == 0 {
        errors.push(ValidationError::new(
            format!("{}.breaker", field),
            "thresholds must be positive",
        ));
    }
    let capacity = provider.rate_limit.capacity;
    if !(capacity.is_finite() && capacity >= 1.0) {
        errors.push(ValidationError::new(
            format!("{}.rate_limit.capacity", field),
            "must be a finite number of at least 1",
        ));
    }
    let refill = provider.rate_limit.refill_per_sec;
    if !(refill.is_finite() && refill >= 0.0) {
        errors.push(ValidationError::new(
            format!("{}.rate_limit.refill_per_sec", field),
            "must be finite and not negative",
        ));
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", value)));
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, e.to_string())),
    }
}
