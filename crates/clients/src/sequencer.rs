use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use lumen_primitives::block::{Batch, Transaction};
use tokio::sync::Mutex;

/// Errors that can occur when fetching a batch from the sequencer.
#[derive(Debug, Clone, thiserror::Error)]
#[allow(missing_docs)]
pub enum SequencerError {
    #[error("sequencer unavailable: {0}")]
    Unavailable(String),
}

/// The source of transaction batches.
#[async_trait]
pub trait Sequencer: Send + Sync + 'static {
    /// Returns the next batch of transactions to include in a block. An empty batch is a
    /// normal answer when no transaction is pending.
    async fn next_batch(&self) -> Result<Batch, SequencerError>;
}

#[derive(Debug, Default)]
struct SequencerInner {
    mempool: VecDeque<Transaction>,
    fail_next: usize,
}

/// An in-memory FIFO sequencer. Every transaction is handed out in exactly one batch.
#[derive(Debug, Clone)]
pub struct InMemorySequencer {
    inner: Arc<Mutex<SequencerInner>>,
    max_batch_txs: usize,
}

impl Default for InMemorySequencer {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl InMemorySequencer {
    /// Creates a new sequencer handing out at most `max_batch_txs` transactions per batch.
    pub fn new(max_batch_txs: usize) -> Self {
        Self { inner: Arc::default(), max_batch_txs: max_batch_txs.max(1) }
    }

    /// Adds a transaction to the mempool.
    pub async fn inject_tx(&self, tx: Transaction) {
        self.inner.lock().await.mempool.push_back(tx);
    }

    /// Makes the next `count` batch requests fail.
    pub async fn fail_next(&self, count: usize) {
        self.inner.lock().await.fail_next = count;
    }

    /// Returns the number of transactions waiting in the mempool.
    pub async fn pending_txs(&self) -> usize {
        self.inner.lock().await.mempool.len()
    }
}

#[async_trait]
impl Sequencer for InMemorySequencer {
    async fn next_batch(&self) -> Result<Batch, SequencerError> {
        let mut inner = self.inner.lock().await;

        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(SequencerError::Unavailable("injected failure".to_owned()));
        }

        let count = inner.mempool.len().min(self.max_batch_txs);
        Ok(Batch::new(inner.mempool.drain(..count).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Bytes;

    #[tokio::test]
    async fn batches_drain_mempool_in_order() {
        let sequencer = InMemorySequencer::new(2);
        for tx in [b"a", b"b", b"c"] {
            sequencer.inject_tx(Bytes::from_static(tx)).await;
        }
        assert_eq!(sequencer.pending_txs().await, 3);

        let first = sequencer.next_batch().await.unwrap();
        assert_eq!(first.transactions, vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);

        let second = sequencer.next_batch().await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(sequencer.pending_txs().await, 0);

        assert!(sequencer.next_batch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let sequencer = InMemorySequencer::default();
        sequencer.fail_next(1).await;

        assert!(sequencer.next_batch().await.is_err());
        assert!(sequencer.next_batch().await.is_ok());
    }
}
