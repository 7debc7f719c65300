use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use tokio::sync::{futures::Notified, Notify};

/// Trigger shared by everything spawned from one [`crate::TaskManager`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal(Arc<AtomicBool>, Arc<Notify>);

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)), Arc::new(Notify::new()))
    }

    /// Send shutdown signal
    pub fn send(&self) {
        self.0.fetch_or(true, Ordering::Relaxed);
        self.1.notify_waiters();
    }

    /// Checks if the signal has been sent.
    pub fn is_sent(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn subscribe(&self) -> Shutdown {
        Shutdown(self.clone())
    }

    fn notified(&self) -> Notified<'_> {
        self.1.notified()
    }
}

pub(crate) struct Shutdown(ShutdownSignal);

impl Shutdown {
    pub(crate) fn should_shutdown(&self) -> bool {
        self.0.is_sent()
    }

    pub(crate) async fn wait_for_shutdown(&self) {
        loop {
            // Register interest before checking the flag so a send in between
            // is not lost.
            let notified = self.0.notified();
            if self.should_shutdown() {
                return;
            }
            notified.await;
        }
    }
}

/// Handed to long-running tasks.  Counts as a pending task until dropped.
pub struct ShutdownGuard(Shutdown, Arc<AtomicUsize>);

impl ShutdownGuard {
    pub(crate) fn new(shutdown: Shutdown, counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(shutdown, counter)
    }

    /// Check if shutdown signal has been sent
    pub fn should_shutdown(&self) -> bool {
        self.0.should_shutdown()
    }

    /// Waits until shutdown signal is sent
    pub async fn wait_for_shutdown(&self) {
        self.0.wait_for_shutdown().await
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.1.fetch_sub(1, Ordering::SeqCst);
    }
}
