use std::time::Duration;

use alloy_primitives::B256;
use derive_more::derive::Display;
use lumen_clients::{
    da::DaError, executor::ExecutionError, gossip::GossipError, sequencer::SequencerError,
    store::StoreError,
};
use lumen_primitives::{BlockHeight, state::StateError};
use thiserror::Error;

/// The collaborators called by the manager under a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Collaborator {
    /// The executor.
    #[display("executor")]
    Executor,
    /// The sequencer.
    #[display("sequencer")]
    Sequencer,
    /// The DA layer.
    #[display("DA layer")]
    Da,
    /// The header gossip.
    #[display("gossip")]
    Gossip,
}

/// The errors that can occur during the manager's operation.
///
/// Fatal errors stop [`BlockManager::run`](crate::BlockManager::run); the others are
/// logged and retried with backoff on a later tick. See [`ManagerError::is_fatal`].
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ManagerError {
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),
    #[error("DA error: {0}")]
    Da(#[from] DaError),
    #[error("Gossip error: {0}")]
    Gossip(#[from] GossipError),
    #[error("The {collaborator} did not answer within {after:?}")]
    Timeout { collaborator: Collaborator, after: Duration },
    #[error("Invalid chain state: {0}")]
    InvalidState(#[from] StateError),
    #[error(
        "The chain tip is owned by block production: expected {expected_height} ({expected_hash}), got {actual_height} ({actual_hash})"
    )]
    TipMismatch {
        expected_height: BlockHeight,
        expected_hash: B256,
        actual_height: BlockHeight,
        actual_hash: B256,
    },
    #[error("Corrupted store: {0}")]
    Corruption(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Task {task} panicked: {message}")]
    TaskPanicked { task: String, message: String },
}

impl ManagerError {
    /// Returns `true` if the error must stop the manager.
    ///
    /// Sequencer, DA and gossip failures are transient: nothing was committed, and the step is
    /// retried on a later tick.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Sequencer(_) | Self::Da(_) | Self::Gossip(_) => false,
            Self::Timeout { collaborator, .. } => matches!(collaborator, Collaborator::Executor),
            _ => true,
        }
    }

    /// Returns a short label of the error, used in metrics.
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Execution(_) => "execution",
            Self::Store(_) => "store",
            Self::Sequencer(_) => "sequencer",
            Self::Da(_) => "da",
            Self::Gossip(_) => "gossip",
            Self::Timeout { .. } => "timeout",
            Self::InvalidState(_) => "invalid_state",
            Self::TipMismatch { .. } => "tip_mismatch",
            Self::Corruption(_) => "corruption",
            Self::InvalidConfig(_) => "invalid_config",
            Self::TaskPanicked { .. } => "panic",
        }
    }
}
