//! Worker subsystem.
//!
//! # Data Flow
//! ```text
//! inbound channel (stdin or in-memory pipe)
//!     → MessageReader (one envelope per line)
//!     → spawn task per envelope
//!         → handler.rs (validate → resolve → proxy)
//!         → MessageSender (reply line)
//!     → outbound channel (stdout or in-memory pipe)
//! ```
//!
//! # Design Decisions
//! - No per-worker concurrency limit; every envelope gets its own task
//! - EOF on the inbound channel means the front end is gone: stop reading,
//!   finish in-flight requests, exit
//! - Logs never go to stdout, which carries replies

pub mod handler;

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::ipc::{spawn_writer, ChannelError, MessageReader};

pub use handler::Worker;

/// Environment variable carrying a worker's index in the pool.
pub const WORKER_INDEX_ENV: &str = "PROXY_WORKER_INDEX";

/// Serve envelopes from `reader`, writing replies to `writer`, until the
/// reader reaches EOF and every in-flight reply has been written.
pub async fn serve<R, W>(worker: Arc<Worker>, reader: R, writer: W) -> Result<(), ChannelError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, writer_task) = spawn_writer(writer);
    let mut inbox = MessageReader::new(reader);

    while let Some(message) = inbox.next_message().await? {
        let worker = Arc::clone(&worker);
        let outbox = outbox.clone();
        tokio::spawn(
            async move {
                if let Some(reply) = worker.handle_message(&message).await {
                    if let Err(e) = outbox.send(&reply) {
                        tracing::warn!(request_id = %reply.id, error = %e, "Failed to send reply");
                    }
                }
            }
            .in_current_span(),
        );
    }

    tracing::debug!("Inbound channel closed; draining in-flight requests");
    drop(outbox);
    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(ChannelError::Io(std::io::Error::other(e))),
    }
}

/// Entry point of a worker process: serve the front end over stdin/stdout.
pub async fn run_process(config: ProxyConfig, index: usize) -> Result<(), ChannelError> {
    let span = tracing::info_span!("worker", index, pid = std::process::id());
    async move {
        tracing::info!(
            rules = config.server.rules.len(),
            upstreams = config.server.upstreams.len(),
            "Worker started"
        );

        let worker = Arc::new(Worker::new(&config));
        serve(worker, tokio::io::stdin(), tokio::io::stdout()).await?;

        tracing::info!("Worker stopped");
        Ok(())
    }
    .instrument(span)
    .await
}
