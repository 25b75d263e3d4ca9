use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use pathfindr_core::parse_elements;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod api;
mod config;

use api::{AppState, build_router};
use config::ServerConfig;

/// HTTP server exposing road-network searches and their replays
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Address to listen on, overrides the config file
    #[arg(long)]
    bind: Option<SocketAddr>,
    /// Overpass JSON document to serve at startup, overrides the config file
    #[arg(long)]
    elements: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pathfindr_server=info,pathfindr_core=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ServerConfig::from_file(path)?
        }
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.http.bind = bind;
    }
    if let Some(elements) = cli.elements {
        config.http.elements = Some(elements);
    }

    let bind = config.http.bind;
    let preload = config.http.elements.clone();
    let state = Arc::new(AppState::new(config));

    if let Some(path) = preload {
        let text = std::fs::read_to_string(&path)?;
        let report = state.load_elements(&parse_elements(&text)?)?;
        info!(
            "Preloaded {}: {} nodes, {} edges",
            path.display(),
            report.nodes,
            report.edges
        );
    }

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on {bind}");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
    }
}
