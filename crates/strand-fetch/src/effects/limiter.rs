use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::trace;

use crate::error::{Error, Result};

/// Counting limiter with FIFO admission.
///
/// Waiters are served in the order they started waiting. Permits are returned
/// when the [`LimiterPermit`] is dropped, including on error and stop paths.
#[derive(Debug, Clone)]
pub struct Limiter {
    name: &'static str,
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct LimiterPermit {
    name: &'static str,
    _permit: OwnedSemaphorePermit,
}

impl LimiterPermit {
    pub fn release(self) {
        trace!(limiter = self.name, "slot released");
    }
}

impl Limiter {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a slot. Fails only after [`close`](Self::close).
    pub async fn acquire(&self) -> Result<LimiterPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Shutdown)?;
        trace!(limiter = self.name, available = self.available(), "slot acquired");
        Ok(LimiterPermit {
            name: self.name,
            _permit: permit,
        })
    }

    pub fn try_acquire(&self) -> Result<Option<LimiterPermit>> {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => Ok(Some(LimiterPermit {
                name: self.name,
                _permit: permit,
            })),
            Err(TryAcquireError::NoPermits) => Ok(None),
            Err(TryAcquireError::Closed) => Err(Error::Shutdown),
        }
    }

    /// Wakes every waiter with [`Error::Shutdown`].
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}
