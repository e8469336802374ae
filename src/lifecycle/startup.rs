//! Front-end startup orchestration.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Order: metrics, workers, listener; traffic is accepted only once every
//!   worker is running

use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::validation::dangling_references;
use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::pool::supervisor::{self, SupervisorError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(std::io::Error),
}

/// Run the front end until a stop signal arrives.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    for dangling in dangling_references(&config) {
        tracing::warn!(
            rule = %dangling.rule_path,
            upstream = %dangling.upstream_id,
            "Rule references an undefined upstream; matching requests will fail with 500"
        );
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pool = supervisor::start(&config)?;

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.server.listen));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!(
        address = %addr,
        workers = pool.capacity(),
        rules = config.server.rules.len(),
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    HttpServer::new(&config, pool)
        .run(listener, stop)
        .await
        .map_err(StartupError::Serve)
}
