use std::fmt;

use derive_more::derive::IsVariant;
use lumen_primitives::state::ChainState;

/// The status of the block production and DA publication pipeline, derived from a chain
/// state snapshot.
///
/// ```text
///   HEIGHTS:  baseline ....... included ........ submitted ........ last block
///             |xxxxxxxxxxxxxxxx|.................|..................|
///                   final        AwaitingInclusion     Producing
/// ```
///
/// - `Synced`: every produced block is confirmed by the DA layer
/// - `AwaitingInclusion`: every produced block is submitted, some are not confirmed yet
/// - `Producing`: some produced blocks are not submitted yet
/// - `Stalled`: the pending bound is reached and block production is paused
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, IsVariant)]
pub enum PipelineStatus {
    /// Every produced block is included in the DA layer.
    Synced,
    /// Some produced blocks are not submitted to the DA layer yet.
    Producing,
    /// Every produced block is submitted, but some are not confirmed yet.
    AwaitingInclusion,
    /// Block production is paused until the DA layer catches up.
    Stalled,
}

impl PipelineStatus {
    /// Derives the status from a chain state snapshot and the pending blocks bound.
    pub const fn from_state(state: &ChainState, max_pending_blocks: u64) -> Self {
        if state.is_backpressured(max_pending_blocks) {
            Self::Stalled
        } else if state.pending_blocks() == 0 {
            Self::Synced
        } else if state.unsubmitted_blocks() == 0 {
            Self::AwaitingInclusion
        } else {
            Self::Producing
        }
    }

    /// Returns an iterable slice of the enum variants.
    pub(crate) const fn variant_names() -> &'static [&'static str; 4] {
        &["Synced", "Producing", "AwaitingInclusion", "Stalled"]
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "Synced"),
            Self::Producing => write!(f, "Producing"),
            Self::AwaitingInclusion => write!(f, "AwaitingInclusion"),
            Self::Stalled => write!(f, "Stalled"),
        }
    }
}

impl fmt::Debug for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use lumen_primitives::state::Genesis;

    fn state(last: u64, submitted: u64, included: u64) -> ChainState {
        let genesis = Genesis {
            chain_id: "status-test".to_owned(),
            initial_height: 1,
            genesis_time: 0,
            proposer: Address::ZERO,
        };
        ChainState {
            last_block_height: last,
            last_submitted_height: submitted,
            da_included_height: included,
            ..ChainState::from_genesis(&genesis, B256::ZERO)
        }
    }

    #[test]
    fn status_derivation() {
        assert_eq!(PipelineStatus::from_state(&state(0, 0, 0), 2), PipelineStatus::Synced);
        assert_eq!(PipelineStatus::from_state(&state(5, 5, 5), 2), PipelineStatus::Synced);
        assert_eq!(PipelineStatus::from_state(&state(1, 0, 0), 2), PipelineStatus::Producing);
        assert_eq!(
            PipelineStatus::from_state(&state(1, 1, 0), 2),
            PipelineStatus::AwaitingInclusion
        );
        assert_eq!(PipelineStatus::from_state(&state(2, 1, 0), 2), PipelineStatus::Stalled);
        assert_eq!(PipelineStatus::from_state(&state(2, 1, 0), 0), PipelineStatus::Producing);
    }

    #[test]
    fn variant_names_match_display() {
        let all = [
            PipelineStatus::Synced,
            PipelineStatus::Producing,
            PipelineStatus::AwaitingInclusion,
            PipelineStatus::Stalled,
        ];
        for (status, name) in all.iter().zip(PipelineStatus::variant_names()) {
            assert_eq!(&status.to_string(), name);
        }
    }
}
