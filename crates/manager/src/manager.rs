use std::{fmt, future::Future, sync::Arc, time::Duration};

use lumen_clients::{
    da::DataAvailability, executor::Executor, gossip::HeaderGossip, sequencer::Sequencer,
    store::Store,
};
use lumen_primitives::{
    BlockHeight,
    block::Header,
    state::{ChainState, Genesis},
    summary::Summary,
    task::{CriticalTasks, TaskFailure},
    time::skipping_interval,
};
use tokio::sync::{Mutex, watch};
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::ManagerConfig,
    error::{Collaborator, ManagerError},
    metrics::ManagerMetrics,
    recovery,
    state::SharedState,
    status::PipelineStatus,
};

/// The base of the exponential backoff applied after a transient failure, in milliseconds.
/// The n-th consecutive failure waits up to `2^n * BACKOFF_FACTOR_MS`.
const BACKOFF_FACTOR_MS: u64 = 50;

/// The collaborators of the [`BlockManager`].
#[derive(Clone)]
pub struct Collaborators {
    /// Applies transaction batches.
    pub executor: Arc<dyn Executor>,
    /// Supplies transaction batches.
    pub sequencer: Arc<dyn Sequencer>,
    /// Publishes headers and answers inclusion queries.
    pub da: Arc<dyn DataAvailability>,
    /// Persists blocks and the chain state.
    pub store: Arc<dyn Store>,
    /// Broadcasts produced headers.
    pub gossip: Arc<dyn HeaderGossip>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// The outcome of a loop step, telling the loop whether to back off before the next tick.
pub(crate) trait StepOutcome {
    /// Returns `true` if the step made no progress because of the DA layer.
    fn should_back_off(&self) -> bool {
        false
    }
}

pub(crate) struct Inner {
    pub(crate) cfg: ManagerConfig,
    pub(crate) genesis: Genesis,
    pub(crate) collaborators: Collaborators,
    pub(crate) shared: SharedState,
    /// Held for a whole production step; the chain tip only moves under it.
    pub(crate) production: Mutex<()>,
}

/// The block manager of a Lumen node.
///
/// The manager owns the chain state and the pending-header queue, and runs three loops
/// over them:
/// - Producing new blocks from sequencer batches when it is the aggregator
/// - Submitting produced headers to the DA layer, in height order
/// - Tracking the DA inclusion of submitted headers
///
/// It is cheap to clone: clones share the same state. Every accessor is safe to call
/// concurrently with the loops.
#[derive(Clone)]
pub struct BlockManager {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for BlockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockManager")
            .field("cfg", &self.inner.cfg)
            .field("state", &self.inner.shared.snapshot())
            .finish_non_exhaustive()
    }
}

impl BlockManager {
    /// Create a new [`BlockManager`] instance.
    ///
    /// The chain state is loaded from the store, or initialized from `genesis` if the store
    /// is empty. The pending-header queue is rebuilt from the stored blocks.
    pub async fn new(
        cfg: ManagerConfig,
        genesis: Genesis,
        collaborators: Collaborators,
    ) -> Result<Self, ManagerError> {
        cfg.validate()?;
        info!("{}", cfg.summary());

        let (state, pending) =
            recovery::recover(&genesis, &collaborators, cfg.collaborator_timeout).await?;

        let shared = SharedState::new(state, pending, cfg.max_pending_blocks);
        let inner = Inner { cfg, genesis, collaborators, shared, production: Mutex::new(()) };

        Ok(Self { inner: Arc::new(inner) })
    }

    /// Returns the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.cfg
    }

    /// Returns the genesis descriptor of the chain.
    pub fn genesis(&self) -> &Genesis {
        &self.inner.genesis
    }

    /// Returns a copy of the current chain state.
    pub fn last_state(&self) -> ChainState {
        self.inner.shared.snapshot()
    }

    /// Replaces the chain state.
    ///
    /// The new state must satisfy the chain state invariants, keep the chain id, never
    /// decrease the DA included height, and keep the chain tip: the last block height, time,
    /// hash and application state hash are owned by block production. The state is persisted
    /// before it is visible.
    pub async fn set_last_state(&self, state: ChainState) -> Result<(), ManagerError> {
        let shared = &self.inner.shared;
        let mut core = shared.lock().await;

        core.state.check_transition(&state)?;
        if !state.has_same_tip(&core.state) {
            return Err(ManagerError::TipMismatch {
                expected_height: core.state.last_block_height,
                expected_hash: core.state.last_block_hash,
                actual_height: state.last_block_height,
                actual_hash: state.last_block_hash,
            })
        }

        self.inner.collaborators.store.save_state(&state).await?;

        core.pending.prune_through(state.da_included_height);
        core.pending.mark_submitted_through(state.last_submitted_height);
        core.pending.mark_unsubmitted_above(state.last_submitted_height);
        core.state = state;
        shared.publish(&mut core);

        debug!(state = %core.state.summary(), "Chain state replaced");
        Ok(())
    }

    /// Returns the height of the last header confirmed by the DA layer.
    pub fn da_included_height(&self) -> BlockHeight {
        self.inner.shared.da_included_height()
    }

    /// Returns the height of the last header accepted by the DA layer.
    pub fn last_submitted_height(&self) -> BlockHeight {
        self.inner.shared.snapshot().last_submitted_height
    }

    /// Returns a receiver notified with every committed chain state.
    pub fn subscribe_state(&self) -> watch::Receiver<ChainState> {
        self.inner.shared.subscribe()
    }

    /// Returns the headers not yet accepted by the DA layer, in height order.
    pub async fn pending_headers(&self) -> Vec<Header> {
        self.inner.shared.lock().await.pending.unsubmitted_headers()
    }

    /// Returns the number of headers not yet accepted by the DA layer.
    pub async fn num_pending_headers(&self) -> usize {
        self.inner.shared.lock().await.pending.num_unsubmitted()
    }

    /// Returns the current pipeline status.
    pub fn status(&self) -> PipelineStatus {
        PipelineStatus::from_state(&self.last_state(), self.inner.shared.max_pending_blocks())
    }

    /// Runs the manager loops until `cancel` is triggered or a fatal error occurs.
    ///
    /// Block production only runs on the aggregator. A fatal error or a panic in any loop
    /// stops the other ones, and the first of them is returned. An in-flight step always
    /// runs to completion before its loop exits.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ManagerError> {
        ManagerMetrics::set_lumen_version(env!("CARGO_PKG_VERSION").to_owned());

        let token = cancel.child_token();
        let mut tasks = CriticalTasks::new();

        if self.inner.cfg.aggregator {
            let this = self.clone();
            let cancel = token.clone();
            tasks.add_task(async move { this.production_loop(cancel).await }, "block production");
        }

        let this = self.clone();
        let cancel = token.clone();
        tasks.add_task(async move { this.submission_loop(cancel).await }, "DA submission");

        let this = self.clone();
        let cancel = token.clone();
        tasks.add_task(async move { this.inclusion_loop(cancel).await }, "DA inclusion");

        info!(aggregator = self.inner.cfg.aggregator, state = %self.last_state().summary(), "🤠 Starting block manager loops");

        let mut first_error = None;
        while let Some(result) = (&mut tasks).await {
            let task = result.name().to_owned();

            match result.into_outcome() {
                Ok(()) => debug!(%task, "Task stopped"),
                Err(TaskFailure::Error(e)) => {
                    error!(%task, error = %e, "Critical task failed");
                    first_error.get_or_insert(e);
                }
                Err(TaskFailure::Panicked(message)) => {
                    error!(%task, %message, "Critical task panicked");
                    first_error.get_or_insert(ManagerError::TaskPanicked { task, message });
                }
            }

            // The loops only stop on cancellation or on a fatal error.
            token.cancel();
        }

        info!("Block manager stopped");
        first_error.map_or(Ok(()), Err)
    }

    async fn production_loop(&self, cancel: CancellationToken) -> Result<(), ManagerError> {
        self.run_loop("block production", self.inner.cfg.block_time, &cancel, || {
            self.produce_block()
        })
        .await
    }

    async fn submission_loop(&self, cancel: CancellationToken) -> Result<(), ManagerError> {
        self.run_loop("DA submission", self.inner.cfg.da_block_time, &cancel, || {
            self.submit_pending()
        })
        .await
    }

    async fn inclusion_loop(&self, cancel: CancellationToken) -> Result<(), ManagerError> {
        self.run_loop("DA inclusion", self.inner.cfg.da_poll_interval, &cancel, || {
            self.poll_inclusion()
        })
        .await
    }

    /// Runs `step` on every tick of `period` until cancelled.
    ///
    /// Transient errors and steps without progress are followed by an exponential backoff
    /// with jitter, capped by the configured maximum. Fatal errors end the loop.
    async fn run_loop<T, F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        cancel: &CancellationToken,
        mut step: F,
    ) -> Result<(), ManagerError>
    where
        T: StepOutcome,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ManagerError>>,
    {
        let mut interval = skipping_interval(period);
        let mut backoff = self.backoff();

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(loop = name, "Loop cancelled");
                    return Ok(())
                }

                _ = interval.tick() => {}
            }

            let back_off = match step().await {
                Ok(outcome) => outcome.should_back_off(),
                Err(e) if e.is_fatal() => {
                    error!(loop = name, error = %e, "Fatal error, stopping");
                    return Err(e)
                }
                Err(e) => {
                    warn!(loop = name, error = %e, "Transient error");
                    true
                }
            };

            if !back_off {
                backoff = self.backoff();
                continue;
            }

            let delay = backoff.next().unwrap_or(self.inner.cfg.max_backoff);
            debug!(loop = name, ?delay, "Backing off");

            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Returns a fresh backoff schedule.
    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        let max = self.inner.cfg.max_backoff;
        ExponentialBackoff::from_millis(2)
            .factor(BACKOFF_FACTOR_MS)
            .max_delay(max)
            .map(move |delay| jitter(delay).min(max))
    }

    /// Awaits a collaborator call, bounded by the configured timeout.
    pub(crate) async fn bounded<T, E, Fut>(
        &self,
        collaborator: Collaborator,
        fut: Fut,
    ) -> Result<T, ManagerError>
    where
        Fut: Future<Output = Result<T, E>>,
        ManagerError: From<E>,
    {
        Self::bounded_call(collaborator, self.inner.cfg.collaborator_timeout, fut).await
    }

    /// Awaits `fut` for at most `after`.
    pub(crate) async fn bounded_call<T, E, Fut>(
        collaborator: Collaborator,
        after: Duration,
        fut: Fut,
    ) -> Result<T, ManagerError>
    where
        Fut: Future<Output = Result<T, E>>,
        ManagerError: From<E>,
    {
        match tokio::time::timeout(after, fut).await {
            Ok(res) => res.map_err(ManagerError::from),
            Err(_) => Err(ManagerError::Timeout { collaborator, after }),
        }
    }
}
