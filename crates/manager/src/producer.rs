use std::time::Instant;

use derive_more::derive::IsVariant;
use lumen_primitives::{
    block::{Header, HeaderTemplate},
    state::ChainState,
    time::{elapsed_since, next_block_timestamp},
};
use tracing::{debug, info, warn};

use crate::{
    BlockManager,
    error::{Collaborator, ManagerError},
    manager::{Inner, StepOutcome},
    metrics::ManagerMetrics,
    pending::SubmissionStatus,
};

/// The outcome of a block production step.
#[derive(Debug, Clone, PartialEq, Eq, IsVariant)]
pub enum ProduceOutcome {
    /// A block was produced, committed and queued for DA submission.
    Produced(Header),
    /// The pending blocks bound is reached.
    Paused,
    /// The batch was empty and lazy mode skipped it.
    SkippedEmpty,
}

impl StepOutcome for ProduceOutcome {}

impl BlockManager {
    /// Runs one block production step.
    ///
    /// The next block is built from a sequencer batch, executed, persisted together with the
    /// new chain state, queued for DA submission, then broadcast. Production pauses while
    /// the number of blocks not yet included in the DA layer reaches the configured bound.
    pub async fn produce_block(&self) -> Result<ProduceOutcome, ManagerError> {
        let start = Instant::now();

        let res = self.try_produce_block().await;
        match &res {
            Ok(ProduceOutcome::Produced(_)) => {
                ManagerMetrics::increment_blocks_produced();
                ManagerMetrics::record_block_production_time(start.elapsed());
            }
            Ok(_) => {}
            Err(e) => ManagerMetrics::increment_block_production_failures(e.kind()),
        }

        res
    }

    async fn try_produce_block(&self) -> Result<ProduceOutcome, ManagerError> {
        let Inner { cfg, collaborators, shared, production, .. } = &*self.inner;

        let _producing = production.lock().await;
        let tip = shared.snapshot();

        if tip.is_backpressured(cfg.max_pending_blocks) {
            debug!(
                pending = tip.pending_blocks(),
                max = cfg.max_pending_blocks,
                "Pending blocks bound reached, pausing block production"
            );
            ManagerMetrics::increment_backpressure_pauses();
            return Ok(ProduceOutcome::Paused)
        }

        let batch = self.bounded(Collaborator::Sequencer, collaborators.sequencer.next_batch()).await?;

        if cfg.lazy_mode &&
            batch.is_empty() &&
            !tip.is_at_genesis() &&
            elapsed_since(tip.last_block_time) < cfg.lazy_block_time
        {
            ManagerMetrics::increment_empty_batches_skipped();
            return Ok(ProduceOutcome::SkippedEmpty)
        }

        let height = tip.next_height();
        let timestamp = next_block_timestamp(tip.last_block_time);

        let app_hash = self
            .bounded(
                Collaborator::Executor,
                collaborators.executor.apply_batch(
                    height,
                    timestamp,
                    tip.app_hash,
                    &batch.transactions,
                ),
            )
            .await?;

        let block = HeaderTemplate {
            chain_id: &tip.chain_id,
            height,
            timestamp,
            parent_hash: tip.last_block_hash,
            proposer: cfg.proposer,
            app_hash,
        }
        .seal(batch.transactions);
        let hash = block.header.hash();

        // Only the commit runs under the state lock.
        let mut core = shared.lock().await;
        if !core.state.has_same_tip(&tip) {
            return Err(ManagerError::Corruption(format!(
                "chain tip moved during block production: expected {}, found {}",
                tip.last_block_height, core.state.last_block_height
            )))
        }

        let next = ChainState {
            last_block_height: height,
            last_block_time: timestamp,
            last_block_hash: hash,
            app_hash,
            ..core.state.clone()
        };
        core.state.check_transition(&next)?;

        collaborators.store.save_block_with_state(&block, &next).await?;

        let tx_count = block.transactions.len();
        core.pending
            .push(block.header.clone(), SubmissionStatus::Unsubmitted)
            .map_err(|e| ManagerError::Corruption(e.to_string()))?;
        core.state = next;
        shared.publish(&mut core);
        drop(core);

        ManagerMetrics::set_block_tx_count(tx_count);
        info!(height, %hash, txs = tx_count, "📦 Produced block");

        let header = block.header;
        let broadcast = collaborators.gossip.broadcast(&header);
        if let Err(e) = self.bounded(Collaborator::Gossip, broadcast).await {
            warn!(height, error = %e, "Failed to broadcast header");
            ManagerMetrics::increment_gossip_failures();
        }

        Ok(ProduceOutcome::Produced(header))
    }
}
