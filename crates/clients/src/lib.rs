#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! The collaborators of the block manager: the executor, the sequencer, the DA layer,
//! the header gossip and the store. Each comes with an in-memory implementation usable
//! for local devnets and tests.

/// Execution environment interface
pub mod executor;

/// Transaction batch source interface
pub mod sequencer;

/// Data availability layer interface
pub mod da;

/// Header gossip interface
pub mod gossip;

/// Block and chain state persistence
pub mod store;
