//! Shutdown and reload coordination for the runtime.

use tokio::sync::{broadcast, watch};

/// Coordinator for graceful shutdown.
///
/// State-based: a listener subscribed after the trigger still observes it.
#[derive(Debug)]
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
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Re-arm after a completed shutdown so the server can start again.
    pub fn reset(&self) {
        self.tx.send_replace(false);
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

/// Receiving side of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Resolve once shutdown has been triggered.
    pub async fn recv(&mut self) {
        loop {
            let triggered = *self.rx.borrow_and_update();
            if triggered {
                return;
            }
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Broadcast of worker reload requests.
///
/// Only listeners subscribed at the time of the request see it.
#[derive(Debug)]
pub struct Reload {
    tx: broadcast::Sender<()>,
}

impl Reload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(4);
        Self { tx }
    }

    pub fn subscribe(&self) -> ReloadListener {
        ReloadListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Request a reload. Returns false when nobody is listening.
    pub fn trigger(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl Default for Reload {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of [`Reload`].
#[derive(Debug)]
pub struct ReloadListener {
    rx: broadcast::Receiver<()>,
}

impl ReloadListener {
    /// Resolve on the next reload request; coalesces requests that lagged.
    ///
    /// Never resolves once the coordinator is gone.
    pub async fn recv(&mut self) {
        loop {
            match self.rx.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
                Err(broadcast::error::RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }
}
