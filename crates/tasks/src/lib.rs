//! Supervision for the node's long-running workers.  Critical tasks that
//! panic bring the whole service down, everything shares one shutdown
//! signal.

use std::{
    any::Any,
    future::Future,
    panic,
    pin::pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use futures_util::{future::select, FutureExt, TryFutureExt};
use tokio::{runtime::Handle, sync::mpsc};
use tracing::{debug, error, info};

mod shutdown;

pub use shutdown::{ShutdownGuard, ShutdownSignal};
use shutdown::Shutdown;

/// A critical task panicked.  Carries the panic message when the payload
/// was a string.
#[derive(Debug, thiserror::Error)]
#[error("critical task `{task_name}` panicked: {reason}")]
pub struct PanickedTaskError {
    task_name: &'static str,
    reason: String,
}

impl PanickedTaskError {
    fn new(task_name: &'static str, payload: Box<dyn Any + Send>) -> Self {
        let reason = payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_else(|| "<non-string payload>".to_string());

        Self { task_name, reason }
    }

    pub fn task_name(&self) -> &str {
        self.task_name
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Owns the panic channel and shutdown signal for a set of tasks.
pub struct TaskManager {
    /// Handle to the tokio runtime.
    tokio_handle: Handle,
    /// Sender half for sending panic signals from tasks
    panicked_tasks_tx: mpsc::UnboundedSender<PanickedTaskError>,
    /// Receiver half for sending panic signals to tasks
    panicked_tasks_rx: mpsc::UnboundedReceiver<PanickedTaskError>,
    /// send shutdown signals to tasks
    shutdown_signal: ShutdownSignal,
    /// pending tasks count
    pending_tasks_counter: Arc<AtomicUsize>,
}

impl TaskManager {
    pub fn new(tokio_handle: Handle) -> Self {
        let (panicked_tasks_tx, panicked_tasks_rx) = mpsc::unbounded_channel();

        Self {
            tokio_handle,
            panicked_tasks_tx,
            panicked_tasks_rx,
            shutdown_signal: ShutdownSignal::new(),
            pending_tasks_counter: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn executor(&self) -> TaskExecutor {
        TaskExecutor {
            tokio_handle: self.tokio_handle.clone(),
            panicked_tasks_tx: self.panicked_tasks_tx.clone(),
            shutdown_signal: self.shutdown_signal.clone(),
            pending_tasks_counter: self.pending_tasks_counter.clone(),
        }
    }

    /// Get shutdown signal trigger
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Number of tasks holding a [`ShutdownGuard`].
    pub fn pending_tasks(&self) -> usize {
        self.pending_tasks_counter.load(Ordering::SeqCst)
    }

    /// Blocks until a critical task panics or shutdown is signalled, then
    /// waits for guarded tasks to wind down.  Returns the first panic, if
    /// any.
    pub fn monitor(mut self, shutdown_timeout: Option<Duration>) -> Result<(), PanickedTaskError> {
        let res = self.wait_for_task_panic(self.shutdown_signal.subscribe());

        self.shutdown_signal.send();
        if !self.wait_for_graceful_shutdown(shutdown_timeout) {
            info!("shutdown timeout expired, forcing shutdown");
        }

        res
    }

    fn wait_for_task_panic(&mut self, shutdown: Shutdown) -> Result<(), PanickedTaskError> {
        self.tokio_handle.block_on(async {
            tokio::select! {
                msg = self.panicked_tasks_rx.recv() => {
                    match msg {
                        Some(error) => Err(error),
                        None => Ok(())
                    }
                }
                _ = shutdown.wait_for_shutdown() => {
                    Ok(())
                }
            }
        })
    }

    /// Returns false if guarded tasks were still running when `timeout`
    /// expired.
    fn wait_for_graceful_shutdown(&self, timeout: Option<Duration>) -> bool {
        let when = timeout.map(|t| Instant::now() + t);
        while self.pending_tasks() > 0 {
            if when.is_some_and(|when| Instant::now() > when) {
                debug!(pending = self.pending_tasks(), "graceful shutdown timed out");
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        debug!("gracefully shut down");
        true
    }
}

/// A type that can spawn new tasks
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    /// Handle to the tokio runtime.
    tokio_handle: Handle,
    /// Sender half for sending panic signals from tasks
    panicked_tasks_tx: mpsc::UnboundedSender<PanickedTaskError>,
    /// send shutdown signals to tasks
    shutdown_signal: ShutdownSignal,
    /// number of pending tasks
    pending_tasks_counter: Arc<AtomicUsize>,
}

impl TaskExecutor {
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Spawns a future that is dropped as soon as shutdown is signalled.
    pub fn spawn_critical_async(
        &self,
        name: &'static str,
        fut: impl Future<Output = ()> + Send + 'static,
    ) -> tokio::task::JoinHandle<()> {
        let task = self.catch_panics(name, fut);
        let shutdown = self.shutdown_signal.subscribe();

        let task = async move {
            let task = pin!(task);
            let shutdown = pin!(shutdown.wait_for_shutdown());
            let _ = select(shutdown, task).await;
        };
        self.tokio_handle.spawn(task)
    }

    /// Spawns a task that watches the shutdown guard itself and exits on its
    /// own terms.  The manager waits for it during graceful shutdown.
    pub fn spawn_critical_async_with_shutdown<F>(
        &self,
        name: &'static str,
        async_func: impl FnOnce(ShutdownGuard) -> F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = ShutdownGuard::new(
            self.shutdown_signal.subscribe(),
            self.pending_tasks_counter.clone(),
        );
        let task = self.catch_panics(name, async_func(shutdown));
        self.tokio_handle.spawn(task)
    }

    fn catch_panics(
        &self,
        name: &'static str,
        fut: impl Future<Output = ()> + Send + 'static,
    ) -> impl Future<Output = ()> + Send + 'static {
        let panicked_tasks_tx = self.panicked_tasks_tx.clone();
        panic::AssertUnwindSafe(fut)
            .catch_unwind()
            .map_err(move |error| {
                let task_error = PanickedTaskError::new(name, error);
                error!("{task_error}");
                let _ = panicked_tasks_tx.send(task_error);
            })
            .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_async_panic_is_reported() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        // dont want to print stack trace for expected error while running test
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));

        executor.spawn_critical_async("clerk-processor", async {
            panic!("intentional panic");
        });

        let err = manager
            .monitor(Some(Duration::from_secs(5)))
            .expect_err("should give error");

        panic::set_hook(original_hook);

        assert_eq!(err.task_name(), "clerk-processor");
        assert_eq!(err.reason(), "intentional panic");
        assert_eq!(
            err.to_string(),
            "critical task `clerk-processor` panicked: intentional panic"
        );
    }

    #[test]
    fn test_shutdown_waits_for_guarded_tasks() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        executor.spawn_critical_async_with_shutdown("fee-processor", |shutdown| async move {
            shutdown.wait_for_shutdown().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        });

        executor.spawn_critical_async("listener", async {
            std::future::pending::<()>().await;
        });

        assert_eq!(manager.pending_tasks(), 1);

        let shutdown_sig = manager.shutdown_signal();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            shutdown_sig.send();
        });

        let res = manager.monitor(Some(Duration::from_secs(5)));
        assert!(matches!(res, Ok(())), "should exit successfully");
    }

    #[test]
    fn test_signal_sent_before_wait_is_seen() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        manager.shutdown_signal().send();
        assert!(manager.shutdown_signal().is_sent());
        assert!(manager.monitor(Some(Duration::from_secs(1))).is_ok());
    }

    #[test]
    fn test_task_can_trigger_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let manager = TaskManager::new(runtime.handle().clone());
        let executor = manager.executor();

        let shutdown_sig = manager.shutdown_signal();
        executor.spawn_critical_async("stop-relayer", async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown_sig.send();
        });

        assert!(manager.monitor(Some(Duration::from_secs(5))).is_ok());
    }
}
