//! Bounded concurrency admission control.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Admission gate bounding the number of concurrent in-flight operations.
///
/// Built on a semaphore rather than a polling loop: `acquire` suspends
/// until a slot frees up and wakes immediately on release. Waiters are
/// served in queue order by the underlying semaphore, but callers should
/// treat ordering as best-effort, not a contract.
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// RAII slot handle. The slot returns to the gate when the guard drops,
/// on success, error, and cancellation paths alike, so a slot can never
/// leak and the in-flight count can never go negative.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        Self { semaphore: Arc::new(Semaphore::new(max_concurrent)), max_concurrent }
    }

    /// Suspend until a slot is free, then occupy it.
    pub async fn acquire(&self) -> SlotGuard {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed");
        SlotGuard { _permit: permit }
    }

    /// Occupy a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| SlotGuard { _permit: permit })
    }

    /// Number of slots currently occupied.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent.saturating_sub(self.semaphore.available_permits())
    }

    /// Configured slot limit.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
