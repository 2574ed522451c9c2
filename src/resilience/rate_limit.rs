//! Per-provider token bucket.
//!
//! Refill is lazy: tokens accrue algebraically from the time elapsed since the
//! last refill, so no background task is needed per provider.

use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::timeouts::Deadline;
use std::time::Duration;

/// Token bucket settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimiterConfig {
    /// Maximum tokens (burst size).
    pub capacity: f64,
    /// Tokens added per second.
    pub refill_rate: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 20.0,
            refill_rate: 10.0,
        }
    }
}

/// A simple token bucket.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, capacity: f64, refill_rate: f64) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).clamp(0.0, capacity);
        self.last_refill = now;
    }
}

/// Token-bucket admission control for one provider.
#[derive(Debug)]
pub struct RateLimiter {
    provider: String,
    config: RateLimiterConfig,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(provider: impl Into<String>, config: RateLimiterConfig) -> Self {
        Self {
            provider: provider.into(),
            config,
            bucket: Mutex::new(TokenBucket::new(config.capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Take `cost` tokens without waiting.
    pub fn try_acquire(&self, cost: f64) -> bool {
        let mut bucket = self.lock();
        bucket.refill(self.config.capacity, self.config.refill_rate);
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Take `cost` tokens, waiting for them to accrue if the deadline allows.
    ///
    /// Returns false without consuming anything if the tokens cannot be
    /// available before `deadline`.
    pub async fn acquire(&self, cost: f64, deadline: Deadline) -> bool {
        if cost > self.config.capacity {
            metrics::record_rate_limited(&self.provider);
            return false;
        }

        loop {
            let wait = {
                let mut bucket = self.lock();
                bucket.refill(self.config.capacity, self.config.refill_rate);
                if bucket.tokens >= cost {
                    bucket.tokens -= cost;
                    return true;
                }
                if self.config.refill_rate <= 0.0 {
                    None
                } else {
                    // A rate too small to express as a wait can never be met.
                    let missing = cost - bucket.tokens;
                    Duration::try_from_secs_f64(missing / self.config.refill_rate).ok()
                }
            };

            match wait {
                Some(wait) if deadline.allows_wait(wait) => {
                    tracing::debug!(provider = %self.provider, wait_ms = wait.as_millis() as u64, "Waiting for rate limit tokens");
                    tokio::time::sleep(wait).await;
                }
                _ => {
                    tracing::debug!(provider = %self.provider, "Rate limit tokens unavailable before deadline");
                    metrics::record_rate_limited(&self.provider);
                    return false;
                }
            }
        }
    }

    /// Tokens currently available, including pending refill. Does not mutate.
    pub fn available(&self) -> f64 {
        let bucket = self.lock();
        let elapsed = Instant::now()
            .duration_since(bucket.last_refill)
            .as_secs_f64();
        (bucket.tokens + elapsed * self.config.refill_rate).clamp(0.0, self.config.capacity)
    }
}
