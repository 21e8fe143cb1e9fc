//! Shutdown coordination for the balancer.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Wraps a watch channel so every long-running task shares one cancellable
/// lifetime. Subscribers created after `trigger()` observe it immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A task's handle on the shared shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been triggered.
    pub async fn recv(&mut self) {
        // A closed channel means the coordinator is gone; treat it as shutdown.
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Errors returned by the drain phase of shutdown.
#[derive(Debug, Error)]
pub enum ShutdownError {
    #[error("drain deadline of {deadline:?} exceeded with {active} connections still active")]
    DeadlineExceeded { deadline: Duration, active: u64 },
}
