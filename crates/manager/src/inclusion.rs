use derive_more::derive::IsVariant;
use lumen_primitives::{BlockHeight, state::ChainState};
use tracing::{debug, info, warn};

use crate::{
    BlockManager,
    error::{Collaborator, ManagerError},
    manager::{Inner, StepOutcome},
    metrics::ManagerMetrics,
};

/// The outcome of a DA inclusion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum InclusionOutcome {
    /// The DA included height advanced.
    Advanced {
        /// The previous DA included height.
        from: BlockHeight,
        /// The new DA included height.
        to: BlockHeight,
    },
    /// The DA layer reported no progress.
    Unchanged,
}

impl StepOutcome for InclusionOutcome {}

impl BlockManager {
    /// Runs one DA inclusion step.
    ///
    /// The DA layer is asked for the highest included height. Answers at or below the known
    /// height are ignored, so the watermark never moves backwards. Answers above the
    /// submitted watermark are clamped to it. On progress, the confirmed headers leave the
    /// pending queue and the executor is notified of their finality.
    pub async fn poll_inclusion(&self) -> Result<InclusionOutcome, ManagerError> {
        let res = self.try_poll_inclusion().await;
        if let Err(e) = &res {
            ManagerMetrics::increment_inclusion_query_failures(e.kind());
        }
        res
    }

    async fn try_poll_inclusion(&self) -> Result<InclusionOutcome, ManagerError> {
        let Inner { collaborators, shared, .. } = &*self.inner;

        let reported = self.bounded(Collaborator::Da, collaborators.da.included_height()).await?;

        let known = shared.da_included_height();
        if reported < known {
            debug!(reported, known, "Ignoring stale DA inclusion answer");
            ManagerMetrics::increment_stale_inclusion_reads();
            return Ok(InclusionOutcome::Unchanged)
        }
        if reported == known {
            return Ok(InclusionOutcome::Unchanged)
        }

        let mut core = shared.lock().await;
        let from = core.state.da_included_height;

        let mut to = reported;
        if to > core.state.last_submitted_height {
            warn!(
                reported,
                submitted = core.state.last_submitted_height,
                "DA layer reports inclusion above the submitted height, clamping"
            );
            to = core.state.last_submitted_height;
        }

        if to <= from {
            return Ok(InclusionOutcome::Unchanged)
        }

        let next = ChainState { da_included_height: to, ..core.state.clone() };
        core.state.check_transition(&next)?;
        collaborators.store.save_state(&next).await?;

        let pruned = core.pending.prune_through(to);
        core.state = next;
        shared.publish(&mut core);
        drop(core);

        info!(from, to, pruned, "✅ Headers included in the DA layer");

        if let Err(e) = self.bounded(Collaborator::Executor, collaborators.executor.set_final(to)).await
        {
            warn!(height = to, error = %e, "Failed to notify the executor of finality");
            ManagerMetrics::increment_finality_notification_failures();
        }

        Ok(InclusionOutcome::Advanced { from, to })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy_primitives::Bytes;
    use async_trait::async_trait;
    use lumen_clients::{
        da::{Confirmation, DaError, DataAvailability, InMemoryDa},
        store::Store,
    };

    use super::*;
    use crate::{PipelineStatus, test_utils::Harness};

    /// Accepts everything and reports a fixed inclusion height.
    #[derive(Debug)]
    struct AheadDa(BlockHeight);

    #[async_trait]
    impl DataAvailability for AheadDa {
        async fn submit(&self, blobs: &[Bytes]) -> Result<usize, DaError> {
            Ok(blobs.len())
        }

        async fn included_height(&self) -> Result<BlockHeight, DaError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn inclusion_prunes_the_queue_and_finalizes() {
        let harness = Harness::with_da(InMemoryDa::new(1_000_000, Confirmation::Manual));
        let manager = harness.manager(Default::default()).await;
        harness.produce(&manager, 4).await;
        manager.submit_pending().await.unwrap();
        assert_eq!(manager.status(), PipelineStatus::AwaitingInclusion);

        assert_eq!(manager.poll_inclusion().await.unwrap(), InclusionOutcome::Unchanged);

        harness.da.confirm_through(2).await;
        assert_eq!(
            manager.poll_inclusion().await.unwrap(),
            InclusionOutcome::Advanced { from: 0, to: 2 }
        );
        assert_eq!(manager.da_included_height(), 2);
        assert_eq!(harness.executor.finalized_height().await, 2);
        assert_eq!(harness.store.get_state().await.unwrap().unwrap().da_included_height, 2);

        harness.da.confirm_through(4).await;
        manager.poll_inclusion().await.unwrap();
        assert_eq!(manager.status(), PipelineStatus::Synced);
        assert_eq!(manager.last_state().pending_blocks(), 0);
    }

    #[tokio::test]
    async fn stale_answers_never_move_the_watermark_back() {
        let harness = Harness::new();
        let manager = harness.manager(Default::default()).await;
        harness.produce(&manager, 3).await;
        manager.submit_pending().await.unwrap();
        manager.poll_inclusion().await.unwrap();
        assert_eq!(manager.da_included_height(), 3);

        harness.da.push_stale_read(1).await;
        assert_eq!(manager.poll_inclusion().await.unwrap(), InclusionOutcome::Unchanged);
        assert_eq!(manager.da_included_height(), 3);
        assert_eq!(manager.last_state().da_included_height, 3);
    }

    #[tokio::test]
    async fn failed_queries_are_transient() {
        let harness = Harness::new();
        let manager = harness.manager(Default::default()).await;
        harness.produce(&manager, 1).await;
        manager.submit_pending().await.unwrap();
        harness.da.fail_next_queries(1).await;

        let err = manager.poll_inclusion().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(manager.da_included_height(), 0);

        assert!(manager.poll_inclusion().await.unwrap().is_advanced());
    }

    #[tokio::test]
    async fn inclusion_is_clamped_to_the_submitted_height() {
        let harness = Harness::new();
        let mut collaborators = harness.collaborators();
        collaborators.da = Arc::new(AheadDa(100));
        let manager =
            BlockManager::new(Default::default(), harness.genesis.clone(), collaborators)
                .await
                .unwrap();

        harness.produce(&manager, 3).await;
        assert_eq!(manager.poll_inclusion().await.unwrap(), InclusionOutcome::Unchanged);

        manager.submit_pending().await.unwrap();
        assert_eq!(
            manager.poll_inclusion().await.unwrap(),
            InclusionOutcome::Advanced { from: 0, to: 3 }
        );
        assert!(manager.last_state().check_invariants().is_ok());
    }
}
