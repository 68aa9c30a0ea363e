use std::sync::atomic::{AtomicU64, Ordering};

use lumen_primitives::{BlockHeight, state::ChainState, summary::Summary};
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::info;

use crate::{metrics::ManagerMetrics, pending::PendingHeaders, status::PipelineStatus};

/// The mutable core of the manager: the live chain state and the pending-header queue.
/// Every read-modify-write of either happens while holding the [`SharedState`] lock.
#[derive(Debug)]
pub(crate) struct ChainCore {
    /// The live chain state.
    pub(crate) state: ChainState,
    /// The headers not yet confirmed by the DA layer.
    pub(crate) pending: PendingHeaders,
    /// The last published pipeline status.
    status: PipelineStatus,
}

/// The chain core behind its lock, plus lock-free views of its last committed version.
#[derive(Debug)]
pub(crate) struct SharedState {
    core: Mutex<ChainCore>,
    /// The last committed chain state snapshot.
    snapshot: watch::Sender<ChainState>,
    /// Mirror of the DA included height of the last committed snapshot.
    da_included: AtomicU64,
    max_pending_blocks: u64,
}

impl SharedState {
    /// Creates the shared state from a recovered chain state and queue.
    pub(crate) fn new(state: ChainState, pending: PendingHeaders, max_pending_blocks: u64) -> Self {
        let status = PipelineStatus::from_state(&state, max_pending_blocks);
        let da_included = AtomicU64::new(state.da_included_height);
        let (snapshot, _) = watch::channel(state.clone());

        let mut core = ChainCore { state, pending, status };
        Self::record(&mut core, None);

        Self { core: Mutex::new(core), snapshot, da_included, max_pending_blocks }
    }

    /// Locks the chain core.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ChainCore> {
        self.core.lock().await
    }

    /// Publishes the chain core after a committed mutation. Must be called while holding
    /// the lock, after the new state has been persisted.
    pub(crate) fn publish(&self, core: &mut ChainCore) {
        self.da_included.store(core.state.da_included_height, Ordering::Release);
        self.snapshot.send_replace(core.state.clone());

        let status = PipelineStatus::from_state(&core.state, self.max_pending_blocks);
        Self::record(core, Some(status));
    }

    fn record(core: &mut ChainCore, status: Option<PipelineStatus>) {
        ManagerMetrics::set_last_block_height(core.state.last_block_height);
        ManagerMetrics::set_last_submitted_height(core.state.last_submitted_height);
        ManagerMetrics::set_da_included_height(core.state.da_included_height);
        ManagerMetrics::set_pending_headers(core.pending.len(), core.pending.num_unsubmitted());

        match status {
            Some(status) if status != core.status => {
                info!(from = %core.status, to = %status, state = %core.state.summary(), "Pipeline status changed");
                core.status = status;
                ManagerMetrics::set_pipeline_status(status);
            }
            Some(_) => {}
            None => ManagerMetrics::set_pipeline_status(core.status),
        }
    }

    /// Returns a copy of the last committed chain state.
    pub(crate) fn snapshot(&self) -> ChainState {
        self.snapshot.borrow().clone()
    }

    /// Returns the DA included height of the last committed chain state.
    pub(crate) fn da_included_height(&self) -> BlockHeight {
        self.da_included.load(Ordering::Acquire)
    }

    /// Returns a receiver of every committed chain state.
    pub(crate) fn subscribe(&self) -> watch::Receiver<ChainState> {
        self.snapshot.subscribe()
    }

    /// Returns the pending blocks bound.
    pub(crate) const fn max_pending_blocks(&self) -> u64 {
        self.max_pending_blocks
    }
}
