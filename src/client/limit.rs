//! Global connection slot limiting.
//!
//! # Responsibilities
//! - Bound the total number of simultaneously open sockets across all
//!   destinations
//! - Suspend connection creators when the ceiling is reached
//!
//! A slot is held for the whole lifetime of a connection, not per
//! request. Dropping the slot returns the permit and wakes one waiter.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Process-wide counting semaphore over connection slots.
#[derive(Clone)]
pub struct ConnectionLimiter {
    permits: Arc<Semaphore>,
    ceiling: usize,
}

/// An acquired slot. Held for the connection's lifetime; the permit is
/// released on drop.
pub struct ConnectionSlot {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionLimiter {
    pub fn new(max_connections_count: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_connections_count)),
            ceiling: max_connections_count,
        }
    }

    /// Wait until a slot is free and claim it.
    ///
    /// Cancelling the wait consumes nothing. The semaphore is never
    /// closed, so acquisition itself cannot fail.
    pub async fn acquire(&self) -> ConnectionSlot {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("connection limiter semaphore closed unexpectedly");
        ConnectionSlot { _permit: permit }
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// The configured ceiling.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }
}
