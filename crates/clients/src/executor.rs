use std::{collections::BTreeMap, sync::Arc, time::Duration};

use alloy_primitives::{B256, keccak256};
use async_trait::async_trait;
use lumen_primitives::{
    BlockHeight,
    block::{Transaction, transactions_digest},
    state::Genesis,
    time::Timestamp,
};
use tokio::sync::Mutex;
use tracing::debug;

/// Errors that can occur when interacting with the executor.
#[derive(Debug, Clone, thiserror::Error)]
#[allow(missing_docs)]
pub enum ExecutionError {
    #[error("chain initialization failed: {0}")]
    InitChain(String),
    #[error("execution of block {height} failed: {reason}")]
    Rejected { height: BlockHeight, reason: String },
    #[error("executor unavailable: {0}")]
    Unavailable(String),
}

/// The execution environment of the rollup. It applies transaction batches on top of the
/// application state and returns the resulting state commitment.
#[async_trait]
pub trait Executor: Send + Sync + 'static {
    /// Initializes the application state from the genesis descriptor and returns the
    /// initial state commitment.
    async fn init_chain(&self, genesis: &Genesis) -> Result<B256, ExecutionError>;

    /// Applies the transactions of the block at `height` on top of `prev_app_hash` and
    /// returns the new state commitment.
    async fn apply_batch(
        &self,
        height: BlockHeight,
        timestamp: Timestamp,
        prev_app_hash: B256,
        transactions: &[Transaction],
    ) -> Result<B256, ExecutionError>;

    /// Notifies the executor that every block up to `height` is included in the DA layer.
    async fn set_final(&self, height: BlockHeight) -> Result<(), ExecutionError>;
}

#[derive(Debug, Default)]
struct ExecutorInner {
    /// Applied blocks, by height, with their transaction count.
    applied: BTreeMap<BlockHeight, usize>,
    /// The highest height notified as final.
    finalized: BlockHeight,
    /// Fail the execution of the block at this height.
    fail_at: Option<BlockHeight>,
    /// Artificial latency of every execution.
    delay: Option<Duration>,
}

/// A deterministic in-memory executor.
///
/// The state commitment of a block is the keccak-256 hash of the previous commitment, the
/// height, the timestamp and the transactions digest.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExecutor {
    inner: Arc<Mutex<ExecutorInner>>,
}

impl InMemoryExecutor {
    /// Creates a new instance of `Self`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the execution of the block at `height` fail.
    pub async fn fail_at(&self, height: BlockHeight) {
        self.inner.lock().await.fail_at = Some(height);
    }

    /// Adds an artificial latency to every execution.
    pub async fn set_delay(&self, delay: Duration) {
        self.inner.lock().await.delay = Some(delay);
    }

    /// Returns the heights applied so far, in ascending order.
    pub async fn applied_heights(&self) -> Vec<BlockHeight> {
        self.inner.lock().await.applied.keys().copied().collect()
    }

    /// Returns the total number of transactions applied so far.
    pub async fn applied_transactions(&self) -> usize {
        self.inner.lock().await.applied.values().sum()
    }

    /// Returns the highest height notified as final.
    pub async fn finalized_height(&self) -> BlockHeight {
        self.inner.lock().await.finalized
    }
}

/// Computes the state commitment of the in-memory executor.
pub fn next_app_hash(
    prev_app_hash: B256,
    height: BlockHeight,
    timestamp: Timestamp,
    transactions: &[Transaction],
) -> B256 {
    let mut preimage = Vec::with_capacity(32 + 8 + 8 + 32);
    preimage.extend_from_slice(prev_app_hash.as_slice());
    preimage.extend_from_slice(&height.to_be_bytes());
    preimage.extend_from_slice(&timestamp.to_be_bytes());
    preimage.extend_from_slice(transactions_digest(transactions).as_slice());
    keccak256(preimage)
}

#[async_trait]
impl Executor for InMemoryExecutor {
    async fn init_chain(&self, genesis: &Genesis) -> Result<B256, ExecutionError> {
        if genesis.chain_id.is_empty() {
            return Err(ExecutionError::InitChain("empty chain id".to_owned()));
        }

        Ok(keccak256(genesis.chain_id.as_bytes()))
    }

    async fn apply_batch(
        &self,
        height: BlockHeight,
        timestamp: Timestamp,
        prev_app_hash: B256,
        transactions: &[Transaction],
    ) -> Result<B256, ExecutionError> {
        let delay = self.inner.lock().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.fail_at == Some(height) {
            return Err(ExecutionError::Rejected { height, reason: "injected failure".to_owned() });
        }

        inner.applied.insert(height, transactions.len());
        debug!(height, txs = transactions.len(), "Applied batch");

        Ok(next_app_hash(prev_app_hash, height, timestamp, transactions))
    }

    async fn set_final(&self, height: BlockHeight) -> Result<(), ExecutionError> {
        let mut inner = self.inner.lock().await;
        inner.finalized = inner.finalized.max(height);
        Ok(())
    }
}
