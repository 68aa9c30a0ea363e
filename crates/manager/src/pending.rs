use std::collections::VecDeque;

use alloy_primitives::Bytes;
use derive_more::derive::IsVariant;
use lumen_primitives::{BlockHeight, block::Header};

/// The DA submission status of a queued header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum SubmissionStatus {
    /// The header was never accepted by the DA layer.
    Unsubmitted,
    /// The header was accepted by the DA layer but its inclusion is not confirmed yet.
    Submitted,
}

/// A header waiting for DA submission or confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingHeader {
    /// The header.
    pub header: Header,
    /// The serialized header, as published to the DA layer.
    pub encoded: Bytes,
    /// The submission status.
    pub status: SubmissionStatus,
}

impl PendingHeader {
    /// Returns the height of the header.
    pub const fn height(&self) -> BlockHeight {
        self.header.height
    }
}

/// The header pushed in the queue does not extend it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pending header queue gap: expected height {expected}, got {got}")]
pub struct QueueGapError {
    /// The height that would extend the queue.
    pub expected: BlockHeight,
    /// The height that was pushed.
    pub got: BlockHeight,
}

/// The ordered record of produced headers that are not yet confirmed by the DA layer.
///
/// Heights form a gapless ascending run. Submitted entries always form a prefix of the
/// queue, since headers are submitted in height order.
#[derive(Debug, Clone, Default)]
pub struct PendingHeaders {
    entries: VecDeque<PendingHeader>,
}

impl PendingHeaders {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header. It must be the successor of the last queued header.
    pub fn push(&mut self, header: Header, status: SubmissionStatus) -> Result<(), QueueGapError> {
        if let Some(expected) = self.last_height().map(|h| h + 1) {
            if header.height != expected {
                return Err(QueueGapError { expected, got: header.height });
            }
        }

        let encoded = header.encoded();
        self.entries.push_back(PendingHeader { header, encoded, status });
        Ok(())
    }

    /// Returns the number of queued headers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the lowest queued height.
    pub fn first_height(&self) -> Option<BlockHeight> {
        self.entries.front().map(PendingHeader::height)
    }

    /// Returns the highest queued height.
    pub fn last_height(&self) -> Option<BlockHeight> {
        self.entries.back().map(PendingHeader::height)
    }

    /// Returns the highest queued header.
    pub fn last_header(&self) -> Option<&Header> {
        self.entries.back().map(|e| &e.header)
    }

    /// Returns the number of headers never accepted by the DA layer.
    pub fn num_unsubmitted(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_unsubmitted()).count()
    }

    /// Returns the headers never accepted by the DA layer, in height order.
    pub fn unsubmitted_headers(&self) -> Vec<Header> {
        self.unsubmitted_iter().map(|e| e.header.clone()).collect()
    }

    /// Returns the next unsubmitted headers to publish: at most `max_count` of them, with a
    /// total serialized size of at most `max_bytes`. The first unsubmitted header is always
    /// returned, whatever its size.
    pub fn next_submission(&self, max_count: usize, max_bytes: usize) -> Vec<PendingHeader> {
        let mut size = 0;
        let mut selected = Vec::new();

        for entry in self.unsubmitted_iter().take(max_count.max(1)) {
            size += entry.encoded.len();
            if !selected.is_empty() && size > max_bytes {
                break;
            }
            selected.push(entry.clone());
        }

        selected
    }

    /// Marks every header up to `height` as submitted.
    pub fn mark_submitted_through(&mut self, height: BlockHeight) {
        for entry in self.entries.iter_mut().take_while(|e| e.height() <= height) {
            entry.status = SubmissionStatus::Submitted;
        }
    }

    /// Marks every header above `height` as unsubmitted.
    pub fn mark_unsubmitted_above(&mut self, height: BlockHeight) {
        for entry in self.entries.iter_mut().filter(|e| e.height() > height) {
            entry.status = SubmissionStatus::Unsubmitted;
        }
    }

    /// Removes every header up to `height`, returning how many were removed.
    pub fn prune_through(&mut self, height: BlockHeight) -> usize {
        let before = self.entries.len();
        while self.entries.front().is_some_and(|e| e.height() <= height) {
            self.entries.pop_front();
        }
        before - self.entries.len()
    }

    fn unsubmitted_iter(&self) -> impl Iterator<Item = &PendingHeader> {
        self.entries.iter().filter(|e| e.status.is_unsubmitted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use lumen_primitives::block::HeaderTemplate;

    fn header(height: BlockHeight) -> Header {
        HeaderTemplate {
            chain_id: "queue-test",
            height,
            timestamp: height,
            parent_hash: B256::ZERO,
            proposer: Address::ZERO,
            app_hash: B256::ZERO,
        }
        .seal(vec![])
        .header
    }

    fn queue(range: std::ops::RangeInclusive<BlockHeight>) -> PendingHeaders {
        let mut queue = PendingHeaders::new();
        for height in range {
            queue.push(header(height), SubmissionStatus::Unsubmitted).unwrap();
        }
        queue
    }

    #[test]
    fn rejects_gaps() {
        let mut queue = queue(3..=4);
        assert_eq!(
            queue.push(header(6), SubmissionStatus::Unsubmitted),
            Err(QueueGapError { expected: 5, got: 6 })
        );
        queue.push(header(5), SubmissionStatus::Unsubmitted).unwrap();
        assert_eq!(queue.first_height(), Some(3));
        assert_eq!(queue.last_height(), Some(5));
    }

    #[test]
    fn submission_lifecycle() {
        let mut queue = queue(1..=5);

        let next = queue.next_submission(2, usize::MAX);
        assert_eq!(next.iter().map(PendingHeader::height).collect::<Vec<_>>(), vec![1, 2]);

        queue.mark_submitted_through(2);
        assert_eq!(queue.num_unsubmitted(), 3);
        assert_eq!(queue.next_submission(10, usize::MAX)[0].height(), 3);

        assert_eq!(queue.prune_through(1), 1);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.num_unsubmitted(), 3);

        queue.mark_unsubmitted_above(1);
        assert_eq!(queue.num_unsubmitted(), 4);

        assert_eq!(queue.prune_through(10), 4);
        assert!(queue.is_empty());
        assert!(queue.next_submission(10, usize::MAX).is_empty());
    }

    #[test]
    fn submission_size_bound_keeps_at_least_one_header() {
        let queue = queue(1..=3);
        let size = queue.next_submission(1, usize::MAX)[0].encoded.len();

        assert_eq!(queue.next_submission(10, 1).len(), 1);
        assert_eq!(queue.next_submission(10, size * 2).len(), 2);
        assert_eq!(queue.next_submission(10, size * 2 + 1).len(), 2);
        assert_eq!(queue.next_submission(10, size * 3).len(), 3);
    }
}
