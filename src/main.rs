//! Gateway bootstrap: CLI, config, discovery seeding, HTTP server.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use pushmux::config::{self, GatewayConfig};
use pushmux::discovery::controller::MembershipController;
use pushmux::discovery::docker::DockerDiscovery;
use pushmux::discovery::StaticDiscovery;
use pushmux::http::HttpServer;
use pushmux::lifecycle::Shutdown;
use pushmux::observability::{logging, metrics};
use pushmux::pool::{strategy, PoolManager};

#[derive(Debug, Parser)]
#[command(name = "pushmux", version, about = "Sticky load-balancing gateway for metrics-push backends")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "pushmux.toml")]
    config: PathBuf,

    /// Address to listen on for the web interface and push API.
    #[arg(long = "web.listen-address")]
    listen_address: Option<String>,

    /// Prefix for the internal routes of web endpoints.
    #[arg(long = "web.route-prefix")]
    route_prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config: GatewayConfig = config::load_config(&cli.config)?;
    if let Some(listen_address) = cli.listen_address {
        config.listener.bind_address = listen_address;
    }
    if let Some(route_prefix) = cli.route_prefix {
        config.gateway.route_prefix = route_prefix;
    }

    logging::init(config.observability.log_json);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pushmux starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "failed to parse metrics address"
                );
            }
        }
    }

    // invalid strategy names are fatal; there is no safe default
    let strategy = strategy::from_name(&config.gateway.strategy)?;
    let pool = Arc::new(PoolManager::new(strategy));
    tracing::info!(
        strategy = pool.strategy_name(),
        prefix = %config.gateway.normalized_route_prefix(),
        "pool manager created"
    );

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();

    let docker = &config.resources.docker;
    if docker.enabled {
        let source = DockerDiscovery::new(&docker.endpoint, &docker.label, &docker.network);
        let controller = MembershipController::new(
            pool.clone(),
            docker.retries,
            Duration::from_secs(docker.retry_timeout_secs),
        );
        // a pool we cannot seed is fatal: the gateway cannot serve
        controller.bootstrap(&source).await?;

        let (events_tx, events_rx) = mpsc::channel(64);
        tokio::spawn(source.run_event_listener(events_tx, shutdown.subscribe()));
        tokio::spawn(controller.run(events_rx, shutdown.subscribe()));
    } else {
        let source = StaticDiscovery::new(config.resources.uris.clone());
        let controller = MembershipController::new(pool.clone(), 1, Duration::ZERO);
        controller.bootstrap(&source).await?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, pool);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
