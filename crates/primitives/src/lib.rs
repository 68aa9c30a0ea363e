#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Lumen primitive types, utilities and constants.

/// Block, header and transaction batch types.
pub mod block;

/// The chain state snapshot and the genesis descriptor.
pub mod state;

/// Time-related utilities.
pub mod time;

/// Utility for summarizing objects into a string for logging purposes.
pub mod summary;

/// Utilities for handling long-running tasks.
pub mod task;

/// Graceful shutdown on process termination signals.
pub mod shutdown;

/// A rollup block height.
pub type BlockHeight = u64;

/// The block protocol version written in every header and chain state.
pub const BLOCK_PROTOCOL_VERSION: u64 = 1;
