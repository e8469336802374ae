//! proxy-cluster
//!
//! A reverse proxy whose front end spreads requests over a pool of workers.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────── front end ───────────────────────┐
//!   Client Request    │  ┌─────────┐   ┌──────────────┐   ┌──────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│ pool (pick)  │──▶│ WorkerHandle     │───┼──┐
//!                     │  │ server  │   │ random/rr/lif│   │ dispatch by id   │   │  │ envelope
//!   Client Response   │  │         │◀──┤              │◀──┤ demultiplex      │◀──┼┐ │ (JSON line)
//!   ◀─────────────────┼──┤         │   └──────────────┘   └──────────────────┘   ││ │
//!                     │  └─────────┘                                             ││ │
//!                     └──────────────────────────────────────────────────────────┘│ ▼
//!                     ┌──────────────────────── worker N ────────────────────────┐│
//!                     │  stdin ─▶ handler ─▶ routing table ─▶ upstream (HTTP) ───┼┼──▶ Backend
//!                     │  stdout ◀─ reply envelope ◀──────────────────────────────┼┘
//!                     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The same binary runs both roles: `proxy-cluster --config proxy.yaml` starts
//! the front end, which re-runs itself as `proxy-cluster worker` once per
//! worker.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use proxy_cluster::config::loader::{config_from_env, load_config};
use proxy_cluster::lifecycle::startup;
use proxy_cluster::observability::logging;
use proxy_cluster::worker::{self, WORKER_INDEX_ENV};

#[derive(Parser)]
#[command(name = "proxy-cluster", version, about = "Reverse proxy with a pool of request workers")]
struct Cli {
    /// Path to the YAML or TOML configuration file
    #[arg(short, long, default_value = "proxy.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve envelopes over stdin/stdout; started by the front end
    #[command(hide = true)]
    Worker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Worker) => run_worker().await,
        None => run_front_end(cli.config).await,
    }
}

async fn run_front_end(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&path)?;
    logging::init(&config.observability);

    tracing::info!(
        config = %path.display(),
        listen = config.server.listen,
        workers = config.server.worker_count(),
        "proxy-cluster v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_worker() -> Result<(), Box<dyn std::error::Error>> {
    let config = config_from_env()?;
    logging::init(&config.observability);

    let index = std::env::var(WORKER_INDEX_ENV)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0);

    worker::run_process(config, index).await?;
    Ok(())
}
