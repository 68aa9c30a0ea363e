use std::{sync::Arc, time::Duration};

use lumen_clients::{
    da::{Confirmation, InMemoryDa},
    executor::InMemoryExecutor,
    gossip::BroadcastGossip,
    sequencer::InMemorySequencer,
    store::MemoryStore,
};
use lumen_primitives::{
    BlockHeight,
    state::{ChainState, Genesis},
    time::current_timestamp_ms,
};

use crate::{BlockManager, Collaborators, ManagerConfig};

pub(crate) const CHAIN_ID: &str = "lumen-test";

/// In-memory collaborators, kept around so that tests can inspect and drive them.
#[derive(Debug, Clone)]
pub(crate) struct Harness {
    pub(crate) executor: InMemoryExecutor,
    pub(crate) sequencer: InMemorySequencer,
    pub(crate) da: InMemoryDa,
    pub(crate) store: MemoryStore,
    pub(crate) gossip: BroadcastGossip,
    pub(crate) genesis: Genesis,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_da(InMemoryDa::new(1_000_000, Confirmation::Immediate))
    }

    pub(crate) fn with_da(da: InMemoryDa) -> Self {
        Self {
            executor: InMemoryExecutor::new(),
            sequencer: InMemorySequencer::default(),
            da,
            store: MemoryStore::new(),
            gossip: BroadcastGossip::new(64),
            genesis: genesis(1),
        }
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            executor: Arc::new(self.executor.clone()),
            sequencer: Arc::new(self.sequencer.clone()),
            da: Arc::new(self.da.clone()),
            store: Arc::new(self.store.clone()),
            gossip: Arc::new(self.gossip.clone()),
        }
    }

    pub(crate) async fn manager(&self, cfg: ManagerConfig) -> BlockManager {
        BlockManager::new(cfg, self.genesis.clone(), self.collaborators()).await.unwrap()
    }

    /// Produces `count` blocks, one step at a time.
    pub(crate) async fn produce(&self, manager: &BlockManager, count: usize) {
        for _ in 0..count {
            assert!(manager.produce_block().await.unwrap().is_produced());
        }
    }
}

pub(crate) fn genesis(initial_height: BlockHeight) -> Genesis {
    Genesis {
        chain_id: CHAIN_ID.to_owned(),
        initial_height,
        genesis_time: current_timestamp_ms(),
        proposer: Default::default(),
    }
}

/// A configuration with short intervals, for tests driving the loops.
pub(crate) fn fast_config() -> ManagerConfig {
    ManagerConfig {
        block_time: Duration::from_millis(10),
        da_block_time: Duration::from_millis(20),
        da_poll_interval: Duration::from_millis(20),
        collaborator_timeout: Duration::from_secs(1),
        max_backoff: Duration::from_millis(50),
        ..Default::default()
    }
}

/// Waits until a committed chain state satisfies `f`, for at most 5 seconds.
pub(crate) async fn wait_for_state(
    manager: &BlockManager,
    f: impl FnMut(&ChainState) -> bool,
) -> ChainState {
    let mut rx = manager.subscribe_state();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(f))
        .await
        .expect("timed out waiting for chain state")
        .unwrap()
        .clone();
    state
}
