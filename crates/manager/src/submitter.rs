use std::time::Instant;

use alloy_primitives::Bytes;
use derive_more::derive::IsVariant;
use lumen_primitives::{BlockHeight, state::ChainState};
use tracing::{debug, info, warn};

use crate::{
    BlockManager,
    error::{Collaborator, ManagerError},
    manager::{Inner, StepOutcome},
    metrics::ManagerMetrics,
};

/// The outcome of a DA submission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum SubmitOutcome {
    /// Every produced header was already accepted by the DA layer.
    Idle,
    /// The DA layer accepted `count` headers, up to height `through`.
    Submitted {
        /// The highest accepted height.
        through: BlockHeight,
        /// The number of accepted headers.
        count: usize,
    },
    /// The DA layer accepted none of the offered headers.
    Rejected,
    /// The submitted watermark was replaced while the DA layer was answering, and the
    /// answer was dropped.
    Discarded,
}

impl StepOutcome for SubmitOutcome {
    fn should_back_off(&self) -> bool {
        self.is_rejected()
    }
}

impl BlockManager {
    /// Runs one DA submission step.
    ///
    /// The lowest unsubmitted headers are offered to the DA layer, bounded in count and in
    /// serialized size. The DA layer may accept a prefix of them: the submitted watermark
    /// advances to the last accepted height and the rest is offered again on a later step.
    /// The chain state is not locked while waiting for the DA layer.
    pub async fn submit_pending(&self) -> Result<SubmitOutcome, ManagerError> {
        let res = self.try_submit_pending().await;
        if let Err(e) = &res {
            ManagerMetrics::increment_submission_failures(e.kind());
        }
        res
    }

    async fn try_submit_pending(&self) -> Result<SubmitOutcome, ManagerError> {
        let Inner { cfg, collaborators, shared, .. } = &*self.inner;

        let (base, batch) = {
            let core = shared.lock().await;
            let batch = core.pending.next_submission(cfg.max_submit_headers, cfg.max_submit_bytes);
            (core.state.last_submitted_height, batch)
        };

        let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
            return Ok(SubmitOutcome::Idle)
        };
        let (first, last) = (first.height(), last.height());

        let blobs = batch.iter().map(|h| h.encoded.clone()).collect::<Vec<Bytes>>();
        let size = blobs.iter().map(|b| b.len()).sum::<usize>();
        debug!(first, last, size, "Submitting headers to the DA layer");

        let start = Instant::now();
        let accepted = self.bounded(Collaborator::Da, collaborators.da.submit(&blobs)).await?;
        ManagerMetrics::record_submission_time(start.elapsed());

        if accepted == 0 {
            warn!(first, last, "DA layer accepted none of the offered headers");
            return Ok(SubmitOutcome::Rejected)
        }

        let count = accepted.min(batch.len());
        let through = batch[count - 1].height();
        let accepted_size = blobs[..count].iter().map(|b| b.len()).sum::<usize>();
        ManagerMetrics::record_submission_size(accepted_size);

        let mut core = shared.lock().await;

        // The accepted headers no longer extend the watermark. They are offered again
        // from the new one.
        if core.state.last_submitted_height != base {
            debug!(
                base,
                current = core.state.last_submitted_height,
                "Submitted watermark moved during submission, discarding the result"
            );
            return Ok(SubmitOutcome::Discarded)
        }

        let next = ChainState { last_submitted_height: through, ..core.state.clone() };
        core.state.check_transition(&next)?;
        collaborators.store.save_state(&next).await?;

        core.pending.mark_submitted_through(through);
        core.state = next;
        shared.publish(&mut core);
        drop(core);

        ManagerMetrics::increment_headers_submitted(count as u64);
        info!(first, through, count, size = accepted_size, "📤 Headers accepted by the DA layer");

        Ok(SubmitOutcome::Submitted { through, count })
    }
}

#[cfg(test)]
mod tests {
    use lumen_clients::{
        da::{Confirmation, InMemoryDa},
        store::Store,
    };

    use super::*;
    use crate::{ManagerConfig, test_utils::Harness};

    #[tokio::test]
    async fn submits_in_height_order_within_bounds() {
        let harness = Harness::new();
        let cfg = ManagerConfig { max_submit_headers: 2, ..Default::default() };
        let manager = harness.manager(cfg).await;

        assert_eq!(manager.submit_pending().await.unwrap(), SubmitOutcome::Idle);

        harness.produce(&manager, 5).await;
        assert_eq!(
            manager.submit_pending().await.unwrap(),
            SubmitOutcome::Submitted { through: 2, count: 2 }
        );
        let pending = manager.pending_headers().await;
        assert_eq!(pending.iter().map(|h| h.height).collect::<Vec<_>>(), vec![3, 4, 5]);

        manager.submit_pending().await.unwrap();
        manager.submit_pending().await.unwrap();
        assert_eq!(manager.submit_pending().await.unwrap(), SubmitOutcome::Idle);

        assert_eq!(harness.da.submissions().await, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert_eq!(manager.last_submitted_height(), 5);
        assert_eq!(manager.num_pending_headers().await, 0);
        assert_eq!(harness.store.get_state().await.unwrap().unwrap().last_submitted_height, 5);

        let published = harness.da.published_headers().await;
        for (height, header) in (1..=5).zip(&published) {
            assert_eq!(*header, harness.store.get_block(height).await.unwrap().unwrap().header);
        }
        assert_eq!(published.len(), 5);
    }

    #[tokio::test]
    async fn partial_acceptance_resumes_after_the_accepted_prefix() {
        let harness = Harness::with_da(
            InMemoryDa::new(1_000_000, Confirmation::Immediate).with_max_blobs(3),
        );
        let manager = harness.manager(Default::default()).await;
        harness.produce(&manager, 4).await;

        assert_eq!(
            manager.submit_pending().await.unwrap(),
            SubmitOutcome::Submitted { through: 3, count: 3 }
        );
        assert_eq!(
            manager.submit_pending().await.unwrap(),
            SubmitOutcome::Submitted { through: 4, count: 1 }
        );
        assert_eq!(harness.da.published_heights().await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn failed_submissions_are_retried_without_gaps() {
        let harness = Harness::new();
        let manager = harness.manager(Default::default()).await;
        harness.produce(&manager, 3).await;
        harness.da.fail_next_submits(2).await;

        for _ in 0..2 {
            let err = manager.submit_pending().await.unwrap_err();
            assert!(matches!(err, ManagerError::Da(_)));
            assert!(!err.is_fatal());
            assert_eq!(manager.last_submitted_height(), 0);
        }

        harness.produce(&manager, 1).await;
        manager.submit_pending().await.unwrap();

        assert_eq!(manager.last_submitted_height(), 4);
        assert_eq!(harness.da.published_heights().await, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn oversized_header_is_rejected_as_transient() {
        let harness = Harness::with_da(InMemoryDa::new(1, Confirmation::Immediate));
        let manager = harness.manager(Default::default()).await;
        harness.produce(&manager, 1).await;

        let err = manager.submit_pending().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(manager.num_pending_headers().await, 1);
    }

    #[test]
    fn only_rejections_back_off() {
        assert!(SubmitOutcome::Rejected.should_back_off());
        assert!(!SubmitOutcome::Idle.should_back_off());
        assert!(!SubmitOutcome::Submitted { through: 1, count: 1 }.should_back_off());
    }
}
