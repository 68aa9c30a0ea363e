use std::{collections::VecDeque, sync::Arc};

use alloy_primitives::Bytes;
use async_trait::async_trait;
use lumen_primitives::{BlockHeight, block::Header};
use tokio::sync::Mutex;
use tracing::debug;

/// Errors that can occur when interacting with the DA layer.
#[derive(Debug, Clone, thiserror::Error)]
#[allow(missing_docs)]
pub enum DaError {
    #[error("blob of {size} bytes exceeds the maximum blob size of {max} bytes")]
    BlobTooLarge { size: usize, max: usize },
    #[error("invalid blob: {0}")]
    InvalidBlob(String),
    #[error("DA layer unavailable: {0}")]
    Unavailable(String),
}

/// The data availability layer where block headers are published.
#[async_trait]
pub trait DataAvailability: Send + Sync + 'static {
    /// Submits the given blobs, in order. The DA layer may accept only a prefix of them:
    /// the returned value is the length of the accepted prefix.
    async fn submit(&self, blobs: &[Bytes]) -> Result<usize, DaError>;

    /// Returns the highest block height whose header is confirmed as included.
    async fn included_height(&self) -> Result<BlockHeight, DaError>;
}

/// How the in-memory DA layer confirms the headers it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Accepted headers are included right away.
    Immediate,
    /// Headers are only included through [`InMemoryDa::confirm_through`].
    Manual,
}

#[derive(Debug)]
struct DaInner {
    confirmation: Confirmation,
    /// Every accepted header, in acceptance order.
    published: Vec<Header>,
    /// The heights accepted by every successful submission.
    submissions: Vec<Vec<BlockHeight>>,
    /// The highest height confirmed in manual mode.
    confirmed: BlockHeight,
    /// Remaining submissions to reject.
    fail_next_submits: usize,
    /// Remaining inclusion queries to reject.
    fail_next_queries: usize,
    /// Stale answers returned by the next inclusion queries.
    stale_reads: VecDeque<BlockHeight>,
}

/// An in-memory DA layer.
///
/// Submissions accept the longest prefix whose total size fits in `max_blob_size` and
/// that holds at most `max_blobs` blobs. A single blob above `max_blob_size` is rejected.
#[derive(Debug, Clone)]
pub struct InMemoryDa {
    inner: Arc<Mutex<DaInner>>,
    max_blob_size: usize,
    max_blobs: usize,
}

impl InMemoryDa {
    /// Creates a new DA layer accepting submissions up to `max_blob_size` bytes.
    pub fn new(max_blob_size: usize, confirmation: Confirmation) -> Self {
        let inner = DaInner {
            confirmation,
            published: Vec::new(),
            submissions: Vec::new(),
            confirmed: 0,
            fail_next_submits: 0,
            fail_next_queries: 0,
            stale_reads: VecDeque::new(),
        };

        Self { inner: Arc::new(Mutex::new(inner)), max_blob_size, max_blobs: usize::MAX }
    }

    /// Limits the number of blobs accepted in a single submission.
    pub fn with_max_blobs(mut self, max_blobs: usize) -> Self {
        self.max_blobs = max_blobs.max(1);
        self
    }

    /// Makes the next `count` submissions fail.
    pub async fn fail_next_submits(&self, count: usize) {
        self.inner.lock().await.fail_next_submits = count;
    }

    /// Makes the next `count` inclusion queries fail.
    pub async fn fail_next_queries(&self, count: usize) {
        self.inner.lock().await.fail_next_queries = count;
    }

    /// Queues a stale answer for the next inclusion query.
    pub async fn push_stale_read(&self, height: BlockHeight) {
        self.inner.lock().await.stale_reads.push_back(height);
    }

    /// Confirms every accepted header up to `height`. Only meaningful in manual mode.
    pub async fn confirm_through(&self, height: BlockHeight) {
        let mut inner = self.inner.lock().await;
        inner.confirmed = inner.confirmed.max(height);
    }

    /// Switches the confirmation mode.
    pub async fn set_confirmation(&self, confirmation: Confirmation) {
        self.inner.lock().await.confirmation = confirmation;
    }

    /// Returns the heights accepted by every successful submission.
    pub async fn submissions(&self) -> Vec<Vec<BlockHeight>> {
        self.inner.lock().await.submissions.clone()
    }

    /// Returns every accepted height, in acceptance order.
    pub async fn published_heights(&self) -> Vec<BlockHeight> {
        self.inner.lock().await.published.iter().map(|h| h.height).collect()
    }

    /// Returns every accepted header, in acceptance order.
    pub async fn published_headers(&self) -> Vec<Header> {
        self.inner.lock().await.published.clone()
    }
}

#[async_trait]
impl DataAvailability for InMemoryDa {
    async fn submit(&self, blobs: &[Bytes]) -> Result<usize, DaError> {
        let mut inner = self.inner.lock().await;

        if inner.fail_next_submits > 0 {
            inner.fail_next_submits -= 1;
            return Err(DaError::Unavailable("injected submission failure".to_owned()));
        }

        if let Some(first) = blobs.first().filter(|b| b.len() > self.max_blob_size) {
            return Err(DaError::BlobTooLarge { size: first.len(), max: self.max_blob_size });
        }

        let mut size = 0;
        let mut accepted = Vec::new();
        for blob in blobs.iter().take(self.max_blobs) {
            size += blob.len();
            if size > self.max_blob_size {
                break;
            }

            let header =
                Header::decode_bytes(blob).map_err(|e| DaError::InvalidBlob(e.to_string()))?;
            accepted.push(header);
        }

        let heights = accepted.iter().map(|h| h.height).collect::<Vec<_>>();
        debug!(?heights, "DA accepted headers");

        let count = accepted.len();
        inner.published.extend(accepted);
        inner.submissions.push(heights);

        Ok(count)
    }

    async fn included_height(&self) -> Result<BlockHeight, DaError> {
        let mut inner = self.inner.lock().await;

        if inner.fail_next_queries > 0 {
            inner.fail_next_queries -= 1;
            return Err(DaError::Unavailable("injected query failure".to_owned()));
        }

        if let Some(stale) = inner.stale_reads.pop_front() {
            return Ok(stale);
        }

        let highest = inner.published.iter().map(|h| h.height).max().unwrap_or_default();
        Ok(match inner.confirmation {
            Confirmation::Immediate => highest,
            Confirmation::Manual => inner.confirmed.min(highest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use lumen_primitives::block::HeaderTemplate;

    fn header_blob(height: BlockHeight) -> Bytes {
        HeaderTemplate {
            chain_id: "da-test",
            height,
            timestamp: height,
            parent_hash: B256::ZERO,
            proposer: Address::ZERO,
            app_hash: B256::ZERO,
        }
        .seal(vec![])
        .header
        .encoded()
    }

    #[tokio::test]
    async fn accepts_the_prefix_that_fits() {
        let blob_len = header_blob(1).len();
        let da = InMemoryDa::new(blob_len * 2, Confirmation::Immediate);

        let blobs = (1..=3).map(header_blob).collect::<Vec<_>>();
        assert_eq!(da.submit(&blobs).await.unwrap(), 2);
        assert_eq!(da.submit(&blobs[2..]).await.unwrap(), 1);

        assert_eq!(da.submissions().await, vec![vec![1, 2], vec![3]]);
        assert_eq!(da.included_height().await.unwrap(), 3);

        let published = da.published_headers().await;
        assert_eq!(published.iter().map(Header::encoded).collect::<Vec<_>>(), blobs);
    }

    #[tokio::test]
    async fn oversized_blob_is_rejected() {
        let da = InMemoryDa::new(4, Confirmation::Immediate);
        assert!(matches!(da.submit(&[header_blob(1)]).await, Err(DaError::BlobTooLarge { .. })));
    }

    #[tokio::test]
    async fn manual_confirmation_and_stale_reads() {
        let da = InMemoryDa::new(100_000, Confirmation::Manual).with_max_blobs(1);
        let blobs = (1..=2).map(header_blob).collect::<Vec<_>>();

        assert_eq!(da.submit(&blobs).await.unwrap(), 1);
        assert_eq!(da.included_height().await.unwrap(), 0);

        da.confirm_through(5).await;
        assert_eq!(da.included_height().await.unwrap(), 1);

        da.push_stale_read(0).await;
        assert_eq!(da.included_height().await.unwrap(), 0);
        assert_eq!(da.included_height().await.unwrap(), 1);

        assert_eq!(da.submit(&blobs[1..]).await.unwrap(), 1);
        assert_eq!(da.included_height().await.unwrap(), 1);
        da.set_confirmation(Confirmation::Immediate).await;
        assert_eq!(da.included_height().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn injected_failures() {
        let da = InMemoryDa::new(100_000, Confirmation::Immediate);
        da.fail_next_submits(1).await;
        da.fail_next_queries(1).await;

        assert!(da.submit(&[header_blob(1)]).await.is_err());
        assert!(da.included_height().await.is_err());
        assert_eq!(da.submit(&[header_blob(1)]).await.unwrap(), 1);
        assert_eq!(da.included_height().await.unwrap(), 1);
    }
}
