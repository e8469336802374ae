//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     supervisor.rs (spawn N workers: child processes or tasks)
//!     → handle.rs (one WorkerHandle per worker: writer + reply demultiplexer)
//!     → WorkerPool (fixed membership, owned by the HTTP front end)
//!
//! Per request:
//!     WorkerPool::pick_worker()
//!     → selector.rs (random / round-robin / least in-flight over live workers)
//!     → WorkerHandle::dispatch(envelope) → reply with the same id
//! ```
//!
//! # Design Decisions
//! - Membership is fixed at startup; a worker that exits is marked dead and
//!   skipped, never respawned
//! - Selection policy is a trait object so it can change without touching
//!   the request path
//! - No global registry: the pool is an ordinary value passed to the server

pub mod handle;
pub mod selector;
pub mod supervisor;

use std::sync::Arc;

pub use handle::WorkerHandle;
pub use selector::Selector;

/// The front end's fixed set of workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Arc<WorkerHandle>>,
    selector: Box<dyn Selector>,
}

impl WorkerPool {
    pub fn new(workers: Vec<WorkerHandle>, selector: Box<dyn Selector>) -> Self {
        Self {
            workers: workers.into_iter().map(Arc::new).collect(),
            selector,
        }
    }

    /// Choose a live worker for the next request.
    pub fn pick_worker(&self) -> Option<Arc<WorkerHandle>> {
        self.selector.next_worker(&self.workers)
    }

    /// Number of live workers.
    pub fn size(&self) -> usize {
        self.workers.iter().filter(|w| w.is_alive()).count()
    }

    /// Number of workers started, live or not.
    pub fn capacity(&self) -> usize {
        self.workers.len()
    }

    pub fn workers(&self) -> &[Arc<WorkerHandle>] {
        &self.workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::selector::RoundRobin;

    #[tokio::test]
    async fn size_counts_live_workers_only() {
        let mut handles = Vec::new();
        let mut peers = Vec::new();
        for index in 0..3 {
            let (front, back) = tokio::io::duplex(1024);
            let (read, write) = tokio::io::split(front);
            handles.push(WorkerHandle::connect(index, read, write));
            peers.push(back);
        }
        let pool = WorkerPool::new(handles, Box::new(RoundRobin::new()));
        assert_eq!(pool.size(), 3);

        pool.workers()[1].mark_exited();
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.capacity(), 3);
        for _ in 0..6 {
            assert_ne!(pool.pick_worker().unwrap().index(), 1);
        }
    }

    #[test]
    fn empty_pool_has_nothing_to_pick() {
        let pool = WorkerPool::new(Vec::new(), Box::new(RoundRobin::new()));
        assert_eq!(pool.size(), 0);
        assert!(pool.pick_worker().is_none());
    }
}
