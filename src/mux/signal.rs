//! Binary wake signal.

use std::time::Duration;

use tokio::sync::Semaphore;

/// A binary semaphore: at most one pending wake, consumed by one waiter.
#[derive(Debug)]
pub struct BinarySignal {
    permits: Semaphore,
}

impl BinarySignal {
    pub fn new() -> Self {
        Self { permits: Semaphore::new(0) }
    }

    /// Make the signal available. A second give before a take is a no-op.
    ///
    /// Only the mediator gives, so check-then-add does not race.
    pub fn give(&self) {
        if self.permits.available_permits() == 0 {
            self.permits.add_permits(1);
        }
    }

    /// Drop a stale wake left over from an earlier wait.
    pub fn clear(&self) {
        while let Ok(permit) = self.permits.try_acquire() {
            permit.forget();
        }
    }

    /// Wait up to `timeout` for the signal. Returns whether it arrived.
    pub async fn take(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            _ => false,
        }
    }
}

impl Default for BinarySignal {
    fn default() -> Self {
        Self::new()
    }
}
