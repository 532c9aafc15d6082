mod api;
mod config;
mod recorder;
mod state;
mod websocket;

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};

use crate::config::{load_config, ServerConfig};
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "perf-server", about = "PerfDeck mobile performance telemetry server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = perf_protocol::DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = "perfdeck.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = if args.config.exists() {
        match load_config(&args.config) {
            Ok(config) => {
                info!(path = %args.config.display(), "loaded configuration");
                config
            }
            Err(e) => {
                warn!(
                    path = %args.config.display(),
                    error = %e,
                    "failed to load config file (using defaults)"
                );
                ServerConfig::default()
            }
        }
    } else {
        info!(path = %args.config.display(), "no config file found, using defaults");
        ServerConfig::default()
    };

    // Screenshots are per-run artifacts: clear leftovers from earlier runs.
    let screenshot_dir = &config.storage.screenshot_dir;
    if screenshot_dir.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(screenshot_dir).await {
            warn!(error = %e, "failed to clear stale screenshots");
        }
    }
    tokio::fs::create_dir_all(screenshot_dir).await?;
    tokio::fs::create_dir_all(&config.storage.record_dir).await?;

    let state = AppState::new(config);
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(addr = %args.listen, "perf server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
