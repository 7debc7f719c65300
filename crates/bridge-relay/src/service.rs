use std::sync::Arc;

use heimdall_chainio::traits::ChainReader;
use heimdall_config::relayer::RelayerConfig;
use heimdall_primitives::{buf::Address, params::ChainParams};
use heimdall_tasks::TaskExecutor;
use tokio::sync::mpsc;
use tracing::*;

use crate::{
    client::{ConsensusClient, TxBroadcaster},
    listener::RootchainListener,
    processor::{ClerkProcessor, FeeProcessor, Processor, ProcessorContext, StakeProcessor},
    scheduler::Scheduler,
};

/// Starts one worker per processor and the rootchain listener feeding them,
/// scanning from `start_block`.
#[allow(clippy::too_many_arguments)]
pub fn start_relayer<R, C, B>(
    config: RelayerConfig,
    chain: &ChainParams,
    reader: Arc<R>,
    consensus: Arc<C>,
    broadcaster: Arc<B>,
    from: Address,
    start_block: u64,
    task_exec: &TaskExecutor,
) where
    R: ChainReader,
    C: ConsensusClient,
    B: TxBroadcaster,
{
    let ctx = Arc::new(ProcessorContext::new(
        consensus,
        broadcaster,
        config,
        from,
        chain.bor_chain_id.clone(),
    ));
    let processors: Vec<Arc<dyn Processor>> = vec![
        Arc::new(ClerkProcessor::new(ctx.clone())),
        Arc::new(FeeProcessor::new(ctx.clone())),
        Arc::new(StakeProcessor::new(ctx)),
    ];

    let mut listener = RootchainListener::new(reader, config, start_block);
    for processor in processors {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        listener.add_route(processor.clone(), tx);

        let scheduler = Scheduler::new(processor.clone(), &config);
        task_exec.spawn_critical_async_with_shutdown(processor.name(), |shutdown| {
            scheduler.run(rx, shutdown)
        });
    }

    task_exec.spawn_critical_async_with_shutdown("rootchain-listener", |shutdown| async move {
        if let Err(err) = listener.run(shutdown).await {
            error!(%err, "rootchain listener exited");
        }
    });
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use heimdall_chainio::{test_utils::TestChainReader, types::ChainEvent};
    use heimdall_primitives::buf::{Buf20, Buf32};
    use heimdall_state::msg::Msg;
    use heimdall_tasks::TaskManager;

    use super::*;
    use crate::test_utils::{MockBroadcaster, MockConsensus};

    #[tokio::test]
    async fn test_relays_confirmed_events_end_to_end() {
        let reader = TestChainReader::new();
        reader.add_event(
            Buf32::from([1; 32]),
            10,
            0,
            ChainEvent::StateSynced {
                id: 1,
                contract: Buf20::from([0xab; 20]),
                data: vec![7],
            },
            10,
        );
        reader.add_event(
            Buf32::from([2; 32]),
            11,
            3,
            ChainEvent::TopUpFee {
                user: Buf20::from([2; 20]),
                fee: 100,
            },
            9,
        );

        let broadcaster = Arc::new(MockBroadcaster::new());
        let config = RelayerConfig {
            poll_interval_ms: 10,
            ..Default::default()
        };
        let manager = TaskManager::new(tokio::runtime::Handle::current());
        start_relayer(
            config,
            &ChainParams::default(),
            Arc::new(reader),
            Arc::new(MockConsensus::new()),
            broadcaster.clone(),
            Buf20::from([0x11; 20]),
            0,
            &manager.executor(),
        );

        for _ in 0..100 {
            if broadcaster.sent().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        manager.shutdown_signal().send();

        let mut sent = broadcaster.sent();
        sent.sort_by_key(|m| m.method_name());
        assert!(matches!(sent.as_slice(), [Msg::EventRecord(_), Msg::TopupTx(_)]));
    }
}
