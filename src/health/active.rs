//! Active health probing.
//!
//! # Responsibilities
//! - Periodically call `health_check` on every non-terminal provider
//! - Record probe outcomes in the provider's health window
//! - Leave providers without a probe untouched

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use uuid::Uuid;

use crate::chain::ProviderChain;
use crate::config::ProbeConfig;
use crate::error::{classify, ErrorRecord, ProviderFailure};
use crate::resilience::Deadline;

pub struct HealthProber {
    chain: Arc<ProviderChain>,
    config: ProbeConfig,
}

impl HealthProber {
    pub fn new(chain: Arc<ProviderChain>, config: ProbeConfig) -> Self {
        Self { chain, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health probes disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.interval_secs,
            timeout_ms = self.config.timeout_ms,
            "Health prober starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health prober received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every non-terminal provider once.
    pub async fn probe_all(&self) {
        for provider in self.chain.providers() {
            if provider.is_terminal() {
                continue;
            }

            let started = Instant::now();
            let deadline = Deadline::after(self.config.timeout());
            let outcome = time::timeout_at(
                deadline.instant(),
                provider.adapter().health_check(deadline),
            )
            .await;

            let failure = match outcome {
                Ok(Ok(true)) => {
                    provider.health().record_success(started.elapsed());
                    continue;
                }
                Ok(Ok(false)) => {
                    tracing::trace!(provider = %provider.name(), "No health probe, skipping");
                    continue;
                }
                Ok(Err(failure)) => failure,
                Err(_) => ProviderFailure::Timeout("health probe timed out".to_string()),
            };

            let (category, _) = classify(&failure);
            tracing::warn!(provider = %provider.name(), category = %category, "Health probe failed");
            provider.health().record_failure(category);
            provider
                .health()
                .record_error(ErrorRecord::new(provider.name(), &failure, Uuid::new_v4()));
        }
    }
}
