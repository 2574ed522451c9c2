use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use provider_relay::admin::setup_admin_router;
use provider_relay::chain::ProviderChain;
use provider_relay::config::{load_config, ConfigWatcher, RelayConfig};
use provider_relay::health::HealthProber;
use provider_relay::http::{AppState, HttpServer};
use provider_relay::lifecycle::{apply_reload, build_chain, signals, Shutdown};
use provider_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "provider-relay")]
#[command(about = "Resilient routing across interchangeable providers", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "provider-relay starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let chain = Arc::new(build_chain(&config)?);
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let prober = HealthProber::new(chain.clone(), config.health.probe.clone());
    tokio::spawn(prober.run(shutdown.subscribe()));

    // Dropping the watcher stops it, so it lives until main returns.
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => Some(spawn_reloader(path, chain.clone(), config.clone(), &shutdown)?),
        _ => None,
    };

    let state = AppState::new(chain, config.server.clone(), config.admin.clone());

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let admin = setup_admin_router(state.clone());
        let stop = shutdown.wait();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, admin).with_graceful_shutdown(stop).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    HttpServer::new(state).run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn spawn_reloader(
    path: &std::path::Path,
    chain: Arc<ProviderChain>,
    mut current: RelayConfig,
    shutdown: &Shutdown,
) -> Result<notify::RecommendedWatcher, notify::Error> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;
    let mut stop = shutdown.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(next) = updates.recv() => {
                    match apply_reload(&chain, &current, &next) {
                        Ok(_) => current = next,
                        Err(e) => tracing::error!(error = %e, "Failed to apply reloaded configuration"),
                    }
                }
                _ = stop.recv() => break,
            }
        }
    });

    Ok(handle)
}
