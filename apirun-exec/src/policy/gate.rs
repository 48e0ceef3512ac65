use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of in-flight attempts sharing one policy.
#[derive(Debug)]
pub struct ConcurrencyGate {
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub async fn acquire(&self) -> SlotGuard {
        // The semaphore is never closed, so a failed acquire only means
        // there is nothing to hold.
        let permit = self.semaphore.clone().acquire_owned().await.ok();
        SlotGuard { _permit: permit }
    }
}

/// Holds a concurrency slot until dropped.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: Option<OwnedSemaphorePermit>,
}

impl SlotGuard {
    pub(crate) fn unrestricted() -> Self {
        Self { _permit: None }
    }
}
