//! The per-session transaction gate.
//!
//! At most one transaction is in flight per session. Connect and notify
//! transitions only take the gate when it is free; reads and writes wait
//! for it in arrival order, bounded by a deadline.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thingy_core::error::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub(crate) struct Gate {
    semaphore: Mutex<Arc<Semaphore>>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            semaphore: Mutex::new(Arc::new(Semaphore::new(1))),
        }
    }

    fn current(&self) -> Result<Arc<Semaphore>> {
        self.semaphore
            .lock()
            .map(|semaphore| Arc::clone(&semaphore))
            .map_err(|_| Error::other("Failed to acquire gate lock"))
    }

    /// Whether no transaction is in flight
    pub(crate) fn is_available(&self) -> bool {
        self.current()
            .map(|semaphore| semaphore.available_permits() > 0)
            .unwrap_or(false)
    }

    pub(crate) fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.current().ok()?.try_acquire_owned().ok()
    }

    /// Wait for the gate in FIFO order, at most `limit`
    pub(crate) async fn acquire_within(&self, limit: Duration) -> Result<OwnedSemaphorePermit> {
        let semaphore = self.current()?;
        match tokio::time::timeout(limit, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(Error::not_connected("the session was closed while waiting")),
            Err(_) => Err(Error::timeout(
                "the transaction gate stayed busy: high operational traffic",
            )),
        }
    }

    /// Close the gate for current waiters and start over with a free one
    pub(crate) fn reset(&self) {
        if let Ok(mut semaphore) = self.semaphore.lock() {
            semaphore.close();
            *semaphore = Arc::new(Semaphore::new(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_holder() {
        let gate = Gate::new();
        let permit = gate.try_acquire().unwrap();
        assert!(!gate.is_available());
        assert!(gate.try_acquire().is_none());
        drop(permit);
        assert!(gate.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out() {
        let gate = Gate::new();
        let _held = gate.try_acquire().unwrap();
        let result = gate.acquire_within(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_reset_wakes_waiters() {
        let gate = Arc::new(Gate::new());
        let _held = gate.try_acquire().unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.acquire_within(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;
        gate.reset();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::NotConnected(_))));
        assert!(gate.is_available());
    }
}
