//! Polls the rootchain for confirmed logs and hands them to processors.

use std::sync::Arc;

use anyhow::bail;
use heimdall_chainio::{traits::ChainReader, types::ChainLog};
use heimdall_config::relayer::RelayerConfig;
use heimdall_tasks::ShutdownGuard;
use tokio::{select, sync::mpsc, time::interval};
use tracing::*;

use crate::{errors::RelayResult, processor::Processor};

/// Most rootchain blocks fetched in one poll.
pub const MAX_BLOCK_RANGE: u64 = 1_000;

struct Route {
    processor: Arc<dyn Processor>,
    tx: mpsc::Sender<ChainLog>,
}

pub struct RootchainListener<R> {
    reader: Arc<R>,
    config: RelayerConfig,
    routes: Vec<Route>,

    /// First block not yet scanned.
    next_block: u64,
}

impl<R: ChainReader> RootchainListener<R> {
    pub fn new(reader: Arc<R>, config: RelayerConfig, start_block: u64) -> Self {
        Self {
            reader,
            config,
            routes: Vec::new(),
            next_block: start_block,
        }
    }

    /// Sends logs the processor handles into `tx`.
    pub fn add_route(&mut self, processor: Arc<dyn Processor>, tx: mpsc::Sender<ChainLog>) {
        self.routes.push(Route { processor, tx });
    }

    pub fn next_block(&self) -> u64 {
        self.next_block
    }

    /// Scans newly confirmed blocks once.  Returns the number of logs routed.
    pub async fn poll_once(&mut self) -> RelayResult<usize> {
        let tip = self.reader.latest_block_number().await?;
        let Some(confirmed) = tip.checked_sub(self.config.main_chain_tx_confirmations) else {
            return Ok(0);
        };
        if confirmed < self.next_block {
            return Ok(0);
        }

        let to = confirmed.min(self.next_block.saturating_add(MAX_BLOCK_RANGE - 1));
        let logs = self.reader.get_logs(self.next_block, to).await?;
        trace!(from = self.next_block, %to, n = logs.len(), "fetched rootchain logs");

        let mut routed = 0;
        for log in logs {
            let kind = log.event.kind();
            for route in self.routes.iter().filter(|r| r.processor.handles(kind)) {
                if route.tx.send(log.clone()).await.is_err() {
                    warn!(name = route.processor.name(), "processor queue closed, dropping log");
                    continue;
                }
                routed += 1;
            }
        }

        self.next_block = to + 1;
        Ok(routed)
    }

    pub async fn run(mut self, shutdown: ShutdownGuard) -> anyhow::Result<()> {
        info!(start = self.next_block, "starting rootchain listener");
        let mut ticker = interval(self.config.poll_interval());

        loop {
            select! {
                _ = shutdown.wait_for_shutdown() => {
                    info!("rootchain listener shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            if self.routes.iter().all(|r| r.tx.is_closed()) {
                bail!("all processor queues closed");
            }

            match self.poll_once().await {
                Ok(0) => {}
                Ok(n) => debug!(%n, next = self.next_block, "routed rootchain logs"),
                Err(err) => warn!(%err, "polling rootchain failed, will retry"),
            }
        }
    }
}
