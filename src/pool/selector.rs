//! Worker selection strategies.
//!
//! Every strategy only considers live workers and returns `None` when there
//! are none.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::config::BalanceStrategy;
use crate::pool::handle::WorkerHandle;

/// Trait for worker selection algorithms.
pub trait Selector: Send + Sync + std::fmt::Debug {
    /// Select the next worker to receive a request.
    fn next_worker(&self, workers: &[Arc<WorkerHandle>]) -> Option<Arc<WorkerHandle>>;
}

/// Build the selector for a configured strategy.
pub fn from_strategy(strategy: BalanceStrategy) -> Box<dyn Selector> {
    match strategy {
        BalanceStrategy::Random => Box::new(RandomSelector),
        BalanceStrategy::RoundRobin => Box::new(RoundRobin::new()),
        BalanceStrategy::LeastInFlight => Box::new(LeastInFlight),
    }
}

/// Uniform random choice among live workers.
#[derive(Debug, Default)]
pub struct RandomSelector;

impl Selector for RandomSelector {
    fn next_worker(&self, workers: &[Arc<WorkerHandle>]) -> Option<Arc<WorkerHandle>> {
        let live: Vec<&Arc<WorkerHandle>> = workers.iter().filter(|w| w.is_alive()).collect();
        if live.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..live.len());
        Some(Arc::clone(live[index]))
    }
}

/// Round-robin selector.
/// Stores an internal counter to rotate through workers.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Selector for RoundRobin {
    fn next_worker(&self, workers: &[Arc<WorkerHandle>]) -> Option<Arc<WorkerHandle>> {
        if workers.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = workers.len();

        (0..len)
            .map(|i| &workers[(start + i) % len])
            .find(|worker| worker.is_alive())
            .cloned()
    }
}

/// Picks the live worker with the fewest requests awaiting a reply.
/// Ties go to the lowest index.
#[derive(Debug, Default)]
pub struct LeastInFlight;

impl Selector for LeastInFlight {
    fn next_worker(&self, workers: &[Arc<WorkerHandle>]) -> Option<Arc<WorkerHandle>> {
        workers
            .iter()
            .filter(|w| w.is_alive())
            .min_by_key(|w| w.in_flight())
            .cloned()
    }
}
