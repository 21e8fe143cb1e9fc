//! tcp-balancer
//!
//! ```text
//!                  ┌──────────────────────────────────────────────────────┐
//!                  │                    TCP BALANCER                      │
//!                  │                                                      │
//!   Client         │  ┌──────────┐   ┌──────────────┐   ┌─────────────┐  │
//!   ───────────────┼─▶│ listener │──▶│ proxy engine │──▶│ pool + CB   │──┼──▶ Node
//!                  │  └──────────┘   └──────┬───────┘   └─────────────┘  │
//!                  │                        │ healthy snapshot           │
//!                  │                        ▼                            │
//!                  │  ┌────────────┐   ┌──────────────┐                  │
//!                  │  │ discovery  │──▶│  directory   │◀── health checks │
//!                  │  └────────────┘   └──────────────┘                  │
//!                  └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use tcp_balancer::config::loader::load_config;
use tcp_balancer::discovery::InventoryDiscovery;
use tcp_balancer::lifecycle::signals::wait_for_signal;
use tcp_balancer::net::Listener;
use tcp_balancer::observability::{logging, metrics};
use tcp_balancer::Balancer;

#[derive(Parser)]
#[command(name = "tcp-balancer", version)]
#[command(about = "Stateless layer-4 TCP load balancer", long_about = None)]
struct Cli {
    /// Optional TOML config file; environment keys override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tcp-balancer starting");
    tracing::info!(
        listen = %config.listener.bind_address(),
        selector = %config.discovery.selector(),
        region = %config.discovery.region,
        target_port = config.backend.target_port,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let discovery = Arc::new(InventoryDiscovery::new(&config.discovery.inventory_path));

    // The only fatal runtime failure.
    let listener = Listener::bind(&config.listener).await?;

    let drain_deadline = config.shutdown.timeout();
    let balancer = Balancer::new(config, discovery);
    balancer.start(listener)?;

    match wait_for_signal().await {
        Ok(signal) => tracing::info!(signal, "Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Signal handler failed, shutting down"),
    }

    if let Err(e) = balancer.shutdown(drain_deadline).await {
        tracing::error!(error = %e, "Shutdown incomplete");
        std::process::exit(1);
    }

    tracing::info!(
        successful = balancer.stats().successful(),
        failed = balancer.stats().failed(),
        "Shutdown complete"
    );
    Ok(())
}
