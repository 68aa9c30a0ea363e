#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Lumen block manager
//!
//! The block manager is responsible for:
//! - Producing new rollup blocks from sequencer batches when it is the aggregator
//! - Publishing produced headers to the DA layer, in height order
//! - Tracking which headers the DA layer has confirmed, and notifying the executor
//!
//! It owns the chain state, which is persisted before any of its changes becomes visible.

/// The main manager module with the loop runner and the state accessors.
mod manager;
pub use manager::{BlockManager, Collaborators};

/// The manager configuration.
mod config;
pub use config::{ManagerConfig, genesis_from_opts};

/// The manager errors.
mod error;
pub use error::{Collaborator, ManagerError};

/// Block production, bounded by the number of blocks not yet included in the DA layer.
mod producer;
pub use producer::ProduceOutcome;

/// Header submission to the DA layer.
mod submitter;
pub use submitter::SubmitOutcome;

/// DA inclusion tracking.
mod inclusion;
pub use inclusion::InclusionOutcome;

/// The ordered queue of headers not yet confirmed by the DA layer.
mod pending;
pub use pending::{PendingHeader, PendingHeaders, QueueGapError, SubmissionStatus};

/// Startup recovery of the chain state and the pending queue.
mod recovery;

/// The chain state container shared by the loops and the accessors.
mod state;

/// The pipeline status.
mod status;
pub use status::PipelineStatus;

/// The metrics for the manager.
mod metrics;

#[cfg(test)]
mod test_utils;
