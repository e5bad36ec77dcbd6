//! Request governance gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Tenant request ──▶ request id ──▶ TenantRateLimiter ──▶ forward handler
//!                                          │ (429 on reject)        │
//!                                          ▼                        ▼
//!                                     counter store           RetryExecutor
//!                                     (per-tenant             (classify, backoff,
//!                                      fixed windows)          cancel on shutdown)
//!                                                                   │
//!                                                                   ▼
//!                                                          upstream collaboration API
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use request_governance::config::{load_config, watcher::ConfigWatcher, GovernanceConfig};
use request_governance::http::GatewayServer;
use request_governance::lifecycle::{signals::wait_for_signal, Shutdown};
use request_governance::observability::{logging::init_logging, metrics::init_metrics};
use request_governance::rate_limit::{spawn_sweeper, TenantRateLimiter};

#[derive(Parser)]
#[command(name = "request-governance")]
#[command(about = "Tenant rate limiting and upstream retry gateway", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GovernanceConfig::default(),
    };

    init_logging(&config.observability.log_level)?;
    tracing::info!("request-governance v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.base_url,
        window_secs = config.rate_limit.window_secs,
        default_limit = config.rate_limit.default_limit,
        max_retries = config.retries.max_retries,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let limiter = Arc::new(TenantRateLimiter::new(config.rate_limit.clone()));
    let sweeper = spawn_sweeper(
        limiter.clone(),
        config.rate_limit.sweep_interval(),
        shutdown.subscribe(),
    );

    // Hot reload of tenant quotas. The watcher stops when dropped.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            let handle = watcher.run()?;
            tokio::spawn(apply_reloads(limiter.clone(), updates, shutdown.clone()));
            Some(handle)
        }
        None => None,
    };

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(&config, limiter, shutdown.clone())?;
    server.run(listener).await?;

    let _ = sweeper.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Swap reloaded rate-limit settings into the live limiter.
async fn apply_reloads(
    limiter: Arc<TenantRateLimiter>,
    mut updates: mpsc::UnboundedReceiver<GovernanceConfig>,
    shutdown: Shutdown,
) {
    let mut shutdown = shutdown.subscribe();
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => {
                    limiter.apply_config(config.rate_limit);
                    tracing::info!("Rate limit configuration reloaded; other sections apply on restart");
                }
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
