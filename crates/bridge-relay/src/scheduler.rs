//! Drives one processor: takes logs off its queue, runs them and holds
//! back the ones that asked to be retried until they are due.

use std::{collections::BTreeMap, future, sync::Arc, time::Duration};

use heimdall_chainio::types::ChainLog;
use heimdall_common::retry::{policies::ExponentialBackoff, Backoff};
use heimdall_config::relayer::RelayerConfig;
use heimdall_tasks::ShutdownGuard;
use tokio::{
    select,
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tracing::*;

use crate::{errors::RelayResult, outcome::TaskOutcome, processor::Processor};

/// A log being relayed, with the transport failures it has hit so far.
#[derive(Clone, Debug)]
pub struct Task {
    pub log: ChainLog,
    pub failures: u32,
}

impl Task {
    pub fn new(log: ChainLog) -> Self {
        Self { log, failures: 0 }
    }
}

/// What happens to a task after one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Disposition {
    Done,
    Retry(Duration),
    Dropped,
}

pub struct Scheduler {
    processor: Arc<dyn Processor>,
    backoff: ExponentialBackoff,
    max_attempts: u32,

    /// Tasks waiting to be retried, keyed by due time and insertion order.
    delayed: BTreeMap<(Instant, u64), Task>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new(processor: Arc<dyn Processor>, config: &RelayerConfig) -> Self {
        Self {
            processor,
            backoff: ExponentialBackoff::default(),
            max_attempts: config.max_task_attempts,
            delayed: BTreeMap::new(),
            next_seq: 0,
        }
    }

    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Number of tasks waiting for a retry.
    pub fn pending_retries(&self) -> usize {
        self.delayed.len()
    }

    /// Decides what to do with a task given the result of running it.
    pub fn dispose(&self, task: &mut Task, res: RelayResult<TaskOutcome>) -> Disposition {
        let name = self.processor.name();
        let log = &task.log;
        match res {
            Ok(TaskOutcome::Committed) => Disposition::Done,
            Ok(TaskOutcome::RetryAfter(delay)) => Disposition::Retry(delay),
            Ok(TaskOutcome::Failed(reason)) => {
                error!(%name, tx_hash = %log.tx_hash, log_index = log.log_index, %reason, "dropping relay task");
                Disposition::Dropped
            }
            Err(err) => {
                task.failures += 1;
                if task.failures >= self.max_attempts {
                    error!(%name, tx_hash = %log.tx_hash, log_index = log.log_index, %err, failures = task.failures, "giving up on relay task");
                    return Disposition::Dropped;
                }

                let delay = self.backoff.delay_after_failures(task.failures);
                warn!(%name, tx_hash = %log.tx_hash, %err, ?delay, "relay task failed, backing off");
                Disposition::Retry(delay)
            }
        }
    }

    /// Runs a task once and queues it again if it needs a retry.
    pub async fn run_task(&mut self, mut task: Task) -> Disposition {
        let res = self.processor.process(&task.log).await;
        let disp = self.dispose(&mut task, res);
        if let Disposition::Retry(delay) = disp {
            self.schedule(task, Instant::now() + delay);
        }
        disp
    }

    fn schedule(&mut self, task: Task, due: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.delayed.insert((due, seq), task);
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed.keys().next().map(|(due, _)| *due)
    }

    /// Worker loop.  Exits on shutdown, or once the queue is closed and no
    /// retries are left.  Tasks still waiting are abandoned, which is safe
    /// since relaying is idempotent.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ChainLog>, shutdown: ShutdownGuard) {
        let name = self.processor.name();
        info!(%name, "starting relay worker");
        let mut rx_open = true;

        loop {
            if !rx_open && self.delayed.is_empty() {
                break;
            }

            let next_due = self.next_due();
            let wait_due = async {
                match next_due {
                    Some(due) => sleep_until(due).await,
                    None => future::pending::<()>().await,
                }
            };

            select! {
                _ = shutdown.wait_for_shutdown() => {
                    info!(%name, pending = self.delayed.len(), "relay worker shutting down");
                    break;
                }
                msg = rx.recv(), if rx_open => match msg {
                    Some(log) => {
                        self.run_task(Task::new(log)).await;
                    }
                    None => rx_open = false,
                },
                _ = wait_due => {
                    if let Some((_, task)) = self.delayed.pop_first() {
                        self.run_task(task).await;
                    }
                }
            }
        }

        info!(%name, "relay worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use heimdall_chainio::types::{ChainEvent, EventKind};
    use heimdall_primitives::buf::Buf20;
    use heimdall_tasks::TaskManager;
    use parking_lot::Mutex;

    use super::*;
    use crate::{errors::RelayError, test_utils::chain_log};

    /// Replays scripted results, then commits.
    struct Scripted {
        script: Mutex<VecDeque<RelayResult<TaskOutcome>>>,
        runs: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<RelayResult<TaskOutcome>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                runs: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Processor for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn handles(&self, kind: EventKind) -> bool {
            kind == EventKind::TopUpFee
        }

        async fn process(&self, _log: &ChainLog) -> RelayResult<TaskOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .unwrap_or(Ok(TaskOutcome::Committed))
        }
    }

    fn log() -> ChainLog {
        chain_log(
            1,
            0,
            10,
            ChainEvent::TopUpFee {
                user: Buf20::from([1; 20]),
                fee: 1,
            },
        )
    }

    fn transport_err() -> RelayResult<TaskOutcome> {
        Err(RelayError::Consensus("down".into()))
    }

    fn config(max_task_attempts: u32) -> RelayerConfig {
        RelayerConfig {
            max_task_attempts,
            ..Default::default()
        }
    }

    #[test]
    fn test_transport_errors_back_off_then_drop() {
        let backoff = ExponentialBackoff::new(100, 2, 1);
        let sched = Scheduler::new(Scripted::new(vec![]), &config(3)).with_backoff(backoff);
        let mut task = Task::new(log());

        assert_eq!(
            sched.dispose(&mut task, transport_err()),
            Disposition::Retry(backoff.delay_after_failures(1))
        );
        assert_eq!(
            sched.dispose(&mut task, transport_err()),
            Disposition::Retry(backoff.delay_after_failures(2))
        );
        assert_eq!(sched.dispose(&mut task, transport_err()), Disposition::Dropped);
        assert_eq!(task.failures, 3);
    }

    #[test]
    fn test_retry_after_does_not_count_as_failure() {
        let sched = Scheduler::new(Scripted::new(vec![]), &config(1));
        let mut task = Task::new(log());
        let delay = Duration::from_secs(30);

        for _ in 0..5 {
            assert_eq!(
                sched.dispose(&mut task, Ok(TaskOutcome::RetryAfter(delay))),
                Disposition::Retry(delay)
            );
        }
        assert_eq!(task.failures, 0);
        assert_eq!(
            sched.dispose(&mut task, Ok(TaskOutcome::failed("bad log"))),
            Disposition::Dropped
        );
        assert_eq!(
            sched.dispose(&mut task, Ok(TaskOutcome::Committed)),
            Disposition::Done
        );
    }

    #[tokio::test]
    async fn test_run_task_requeues_retries() {
        let p = Scripted::new(vec![Ok(TaskOutcome::RetryAfter(Duration::from_secs(60)))]);
        let mut sched = Scheduler::new(p.clone(), &config(3));

        let disp = sched.run_task(Task::new(log())).await;

        assert_eq!(disp, Disposition::Retry(Duration::from_secs(60)));
        assert_eq!(sched.pending_retries(), 1);
        assert_eq!(p.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_retries_until_committed() {
        let p = Scripted::new(vec![
            Ok(TaskOutcome::RetryAfter(Duration::from_millis(10))),
            transport_err(),
        ]);
        let sched = Scheduler::new(p.clone(), &config(5))
            .with_backoff(ExponentialBackoff::new(10, 2, 1));

        let manager = TaskManager::new(tokio::runtime::Handle::current());
        let executor = manager.executor();
        let (tx, rx) = mpsc::channel(8);
        let handle = executor.spawn_critical_async_with_shutdown("scripted", |guard| {
            sched.run(rx, guard)
        });

        tx.send(log()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        // First run asks to wait, second hits a transport error, third commits.
        assert_eq!(p.runs.load(Ordering::SeqCst), 3);
    }
}
