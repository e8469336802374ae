//! Front-end handle to one worker.
//!
//! # Responsibilities
//! - Send request envelopes to the worker
//! - Demultiplex replies to their waiting requests by request id
//! - Track liveness; fail pending requests when the worker goes away
//!
//! # Design Decisions
//! - A pending entry is registered before the envelope is sent and removed
//!   exactly once: by its reply, by worker exit, or by the waiting request
//!   being dropped
//! - Liveness is only ever cleared, never restored

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;

use crate::error::ProxyError;
use crate::ipc::{
    correlation_id, spawn_writer, MessageReader, MessageSender, ReplyEnvelope, RequestEnvelope,
    RequestId,
};
use crate::observability::metrics;

type ReplySlot = oneshot::Sender<Result<ReplyEnvelope, ProxyError>>;

#[derive(Debug)]
struct Shared {
    index: usize,
    pending: DashMap<RequestId, ReplySlot>,
    alive: AtomicBool,
}

impl Shared {
    fn complete(&self, id: RequestId, result: Result<ReplyEnvelope, ProxyError>) -> bool {
        match self.pending.remove(&id) {
            Some((_, slot)) => {
                // The requester may have given up already.
                let _ = slot.send(result);
                true
            }
            None => false,
        }
    }

    fn mark_exited(&self) {
        self.alive.store(false, Ordering::SeqCst);

        let ids: Vec<RequestId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let failed = ids
            .into_iter()
            .filter(|id| self.complete(*id, Err(ProxyError::WorkerExited(self.index))))
            .count();

        metrics::record_worker_exit();
        tracing::warn!(
            worker = self.index,
            failed_requests = failed,
            "Worker exited; removed from pool"
        );
    }
}

/// Handle to a running worker, shared by every request routed to it.
#[derive(Debug)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
    outbox: MessageSender,
    pid: Option<u32>,
}

impl WorkerHandle {
    /// Attach to a worker reachable through `reader` (its replies) and
    /// `writer` (its inbound envelopes).
    pub fn connect<R, W>(index: usize, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared {
            index,
            pending: DashMap::new(),
            alive: AtomicBool::new(true),
        });

        let (outbox, writer_task) = spawn_writer(writer);
        tokio::spawn(async move {
            if let Ok(Err(e)) = writer_task.await {
                tracing::warn!(worker = index, error = %e, "Worker channel write failed");
            }
        });

        tokio::spawn(demultiplex(Arc::clone(&shared), MessageReader::new(reader)));

        Self {
            shared,
            outbox,
            pid: None,
        }
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    pub fn index(&self) -> usize {
        self.shared.index
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    /// Number of requests waiting for a reply from this worker.
    pub fn in_flight(&self) -> usize {
        self.shared.pending.len()
    }

    /// Send an envelope and wait for the reply carrying the same id.
    ///
    /// An id already waiting on this worker (a repeated client
    /// `x-request-id`) is replaced with a fresh one before sending.
    pub async fn dispatch(
        &self,
        mut envelope: RequestEnvelope,
    ) -> Result<ReplyEnvelope, ProxyError> {
        let index = self.index();
        let (slot, reply) = oneshot::channel();

        loop {
            match self.shared.pending.entry(envelope.id) {
                Entry::Occupied(_) => envelope.id = RequestId::new(),
                Entry::Vacant(vacant) => {
                    vacant.insert(slot);
                    break;
                }
            }
        }
        let id = envelope.id;
        let _pending = PendingGuard {
            shared: &self.shared,
            id,
        };

        if !self.is_alive() {
            return Err(ProxyError::WorkerUnavailable(index));
        }

        if let Err(e) = self.outbox.send(&envelope) {
            tracing::warn!(worker = index, request_id = %id, error = %e, "Failed to send envelope");
            return Err(ProxyError::WorkerUnavailable(index));
        }
        metrics::record_dispatch(index);

        match reply.await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::WorkerExited(index)),
        }
    }

    #[cfg(test)]
    pub(crate) fn mark_exited(&self) {
        self.shared.mark_exited();
    }
}

/// Clears a pending registration when the waiting request ends for any reason.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending.remove(&self.id);
    }
}

async fn demultiplex<R>(shared: Arc<Shared>, mut replies: MessageReader<R>)
where
    R: AsyncRead + Unpin,
{
    loop {
        let message = match replies.next_message().await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(worker = shared.index, error = %e, "Worker channel read failed");
                break;
            }
        };

        match ReplyEnvelope::parse(&message) {
            Ok(reply) => {
                let id = reply.id;
                if !shared.complete(id, Ok(reply)) {
                    tracing::debug!(
                        worker = shared.index,
                        request_id = %id,
                        "Reply for a request no longer waiting"
                    );
                }
            }
            Err(e) => {
                tracing::error!(worker = shared.index, error = %e, "Malformed reply from worker");
                if let Some(id) = correlation_id(&message) {
                    shared.complete(id, Err(ProxyError::MalformedReply));
                }
            }
        }
    }

    shared.mark_exited();
}
