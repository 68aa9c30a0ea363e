use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{BLOCK_PROTOCOL_VERSION, BlockHeight, summary::Summary, time::Timestamp};

/// The genesis descriptor of a rollup chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    /// The chain id.
    pub chain_id: String,
    /// The height of the first block. Must be at least 1.
    pub initial_height: BlockHeight,
    /// The genesis time, in UNIX milliseconds. The first block is timestamped after it.
    pub genesis_time: Timestamp,
    /// The identity of the aggregator.
    pub proposer: Address,
}

impl Genesis {
    /// Returns the height below the first block, where all watermarks start.
    pub const fn baseline(&self) -> BlockHeight {
        self.initial_height.saturating_sub(1)
    }
}

/// Errors returned when a [`ChainState`] violates one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum StateError {
    #[error("initial height must be at least 1")]
    ZeroInitialHeight,
    #[error("unsupported state version {0}")]
    UnsupportedVersion(u64),
    #[error("{name} ({height}) is below the genesis baseline ({baseline})")]
    BelowBaseline { name: &'static str, height: BlockHeight, baseline: BlockHeight },
    #[error("last submitted height ({submitted}) is above last block height ({last})")]
    SubmittedAheadOfChain { submitted: BlockHeight, last: BlockHeight },
    #[error("DA included height ({included}) is above last submitted height ({submitted})")]
    IncludedAheadOfSubmitted { included: BlockHeight, submitted: BlockHeight },
    #[error("chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: String, actual: String },
    #[error("DA included height cannot decrease from {current} to {new}")]
    IncludedHeightDecreased { current: BlockHeight, new: BlockHeight },
}

/// A snapshot of the chain progress.
///
/// Exactly one live instance exists per node, owned by the block manager. All the
/// watermarks start at the genesis baseline (`initial_height - 1`) and respect
/// `baseline <= da_included_height <= last_submitted_height <= last_block_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainState {
    /// The protocol version of the state.
    pub version: u64,
    /// The chain id.
    pub chain_id: String,
    /// The height of the first block of the chain.
    pub initial_height: BlockHeight,
    /// The height of the last produced block.
    pub last_block_height: BlockHeight,
    /// The timestamp of the last produced block, or the genesis time.
    pub last_block_time: Timestamp,
    /// The hash of the last produced block header, or zero before the first block.
    pub last_block_hash: B256,
    /// The highest height accepted by the DA layer.
    pub last_submitted_height: BlockHeight,
    /// The highest height confirmed as included by the DA layer.
    pub da_included_height: BlockHeight,
    /// The application state commitment after the last block.
    pub app_hash: B256,
}

impl ChainState {
    /// Creates the initial chain state from the genesis descriptor and the commitment
    /// returned by the executor on chain initialization.
    pub fn from_genesis(genesis: &Genesis, app_hash: B256) -> Self {
        let baseline = genesis.baseline();

        Self {
            version: BLOCK_PROTOCOL_VERSION,
            chain_id: genesis.chain_id.clone(),
            initial_height: genesis.initial_height,
            last_block_height: baseline,
            last_block_time: genesis.genesis_time,
            last_block_hash: B256::ZERO,
            last_submitted_height: baseline,
            da_included_height: baseline,
            app_hash,
        }
    }

    /// Returns the genesis baseline height.
    pub const fn baseline(&self) -> BlockHeight {
        self.initial_height.saturating_sub(1)
    }

    /// Returns true if no block has been produced yet.
    pub const fn is_at_genesis(&self) -> bool {
        self.last_block_height == self.baseline()
    }

    /// Returns the height of the next block to produce.
    pub const fn next_height(&self) -> BlockHeight {
        self.last_block_height + 1
    }

    /// Returns true if both states point at the same chain tip: last block height, time,
    /// hash and application state hash.
    pub fn has_same_tip(&self, other: &Self) -> bool {
        self.last_block_height == other.last_block_height &&
            self.last_block_time == other.last_block_time &&
            self.last_block_hash == other.last_block_hash &&
            self.app_hash == other.app_hash
    }

    /// Returns the number of produced blocks that are not yet confirmed by the DA layer.
    pub const fn pending_blocks(&self) -> u64 {
        self.last_block_height.saturating_sub(self.da_included_height)
    }

    /// Returns the number of produced blocks that are not yet accepted by the DA layer.
    pub const fn unsubmitted_blocks(&self) -> u64 {
        self.last_block_height.saturating_sub(self.last_submitted_height)
    }

    /// Returns true if block production must pause, given the maximum number of
    /// pending blocks. A `max_pending` of zero disables the bound.
    pub const fn is_backpressured(&self, max_pending: u64) -> bool {
        max_pending > 0 && self.pending_blocks() >= max_pending
    }

    /// Checks the ordering invariants of the state.
    pub fn check_invariants(&self) -> Result<(), StateError> {
        if self.initial_height == 0 {
            return Err(StateError::ZeroInitialHeight);
        }

        if self.version != BLOCK_PROTOCOL_VERSION {
            return Err(StateError::UnsupportedVersion(self.version));
        }

        let baseline = self.baseline();
        if self.da_included_height < baseline {
            return Err(StateError::BelowBaseline {
                name: "DA included height",
                height: self.da_included_height,
                baseline,
            });
        }

        if self.last_submitted_height > self.last_block_height {
            return Err(StateError::SubmittedAheadOfChain {
                submitted: self.last_submitted_height,
                last: self.last_block_height,
            });
        }

        if self.da_included_height > self.last_submitted_height {
            return Err(StateError::IncludedAheadOfSubmitted {
                included: self.da_included_height,
                submitted: self.last_submitted_height,
            });
        }

        Ok(())
    }

    /// Checks that `next` is an acceptable replacement for this state: it must satisfy
    /// the invariants, keep the chain id and never move the DA watermark backwards.
    pub fn check_transition(&self, next: &Self) -> Result<(), StateError> {
        next.check_invariants()?;

        if next.chain_id != self.chain_id {
            return Err(StateError::ChainIdMismatch {
                expected: self.chain_id.clone(),
                actual: next.chain_id.clone(),
            });
        }

        if next.da_included_height < self.da_included_height {
            return Err(StateError::IncludedHeightDecreased {
                current: self.da_included_height,
                new: next.da_included_height,
            });
        }

        Ok(())
    }
}

impl Summary for ChainState {
    fn summary(&self) -> String {
        format!(
            "chain_id={}, height={}, submitted={}, included={}, last_block_time={}, last_hash={}",
            self.chain_id,
            self.last_block_height,
            self.last_submitted_height,
            self.da_included_height,
            self.last_block_time,
            self.last_block_hash
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis(initial_height: BlockHeight) -> Genesis {
        Genesis {
            chain_id: "lumen-test".to_owned(),
            initial_height,
            genesis_time: 1_700_000_000_000,
            proposer: Address::repeat_byte(0xaa),
        }
    }

    #[test]
    fn genesis_state_sits_at_baseline() {
        let state = ChainState::from_genesis(&genesis(10), B256::repeat_byte(1));

        assert_eq!(state.last_block_height, 9);
        assert_eq!(state.last_submitted_height, 9);
        assert_eq!(state.da_included_height, 9);
        assert_eq!(state.next_height(), 10);
        assert!(state.is_at_genesis());
        assert_eq!(state.pending_blocks(), 0);
        state.check_invariants().unwrap();
    }

    #[test]
    fn backpressure_bound() {
        let mut state = ChainState::from_genesis(&genesis(1), B256::ZERO);
        state.last_block_height = 2;

        assert!(state.is_backpressured(2));
        assert!(!state.is_backpressured(3));
        assert!(!state.is_backpressured(0));
    }

    #[test]
    fn invariant_violations_are_detected() {
        let base = ChainState::from_genesis(&genesis(1), B256::ZERO);

        let mut bad = base.clone();
        bad.last_submitted_height = 1;
        assert!(matches!(bad.check_invariants(), Err(StateError::SubmittedAheadOfChain { .. })));

        let mut bad = base.clone();
        bad.last_block_height = 3;
        bad.last_submitted_height = 2;
        bad.da_included_height = 3;
        assert!(matches!(bad.check_invariants(), Err(StateError::IncludedAheadOfSubmitted { .. })));

        let mut bad = base.clone();
        bad.initial_height = 5;
        assert!(matches!(bad.check_invariants(), Err(StateError::BelowBaseline { .. })));

        let mut bad = base;
        bad.initial_height = 0;
        assert_eq!(bad.check_invariants(), Err(StateError::ZeroInitialHeight));
    }

    #[test]
    fn transitions_never_decrease_the_da_watermark() {
        let mut current = ChainState::from_genesis(&genesis(1), B256::ZERO);
        current.last_block_height = 4;
        current.last_submitted_height = 4;
        current.da_included_height = 3;

        let mut next = current.clone();
        next.da_included_height = 2;
        assert!(matches!(
            current.check_transition(&next),
            Err(StateError::IncludedHeightDecreased { current: 3, new: 2 })
        ));

        let mut next = current.clone();
        next.chain_id = "other".to_owned();
        assert!(matches!(current.check_transition(&next), Err(StateError::ChainIdMismatch { .. })));

        let mut next = current.clone();
        next.da_included_height = 4;
        current.check_transition(&next).unwrap();
    }

    #[test]
    fn state_survives_json() {
        let state = ChainState::from_genesis(&genesis(1), B256::repeat_byte(7));
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<ChainState>(&json).unwrap(), state);
    }
}
