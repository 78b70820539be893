use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Global admission control for outbound calls.
///
/// Every lookup holds exactly one [`Permit`] while it talks to the remote
/// side, so no more than `capacity` calls are ever in flight, no matter how
/// many resolution tasks share the limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
}

/// Held for the duration of one outbound call. Dropping it releases the
/// permit.
#[derive(Debug)]
pub struct Permit {
    inner: Arc<Inner>,
    _permit: OwnedSemaphorePermit,
}

impl RateLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits until a permit is free. Never fails, only delays.
    pub async fn acquire(&self) -> Permit {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("limiter semaphore is never closed");

        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);

        Permit {
            inner: self.inner.clone(),
            _permit: permit,
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
