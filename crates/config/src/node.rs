use std::time::Duration;

use clap::Parser;

/// Node-related configuration options
#[derive(Debug, Clone, Parser)]
pub struct NodeOpts {
    /// Whether this node is the aggregator of the chain. Only the aggregator produces blocks;
    /// other nodes still publish and track the headers they already have.
    #[clap(long = "node.aggregator", env = "LUMEN_AGGREGATOR", default_value_t = false)]
    pub aggregator: bool,
    /// The block time (in milliseconds).
    #[clap(long = "node.block-time-ms", env = "LUMEN_BLOCK_TIME_MS", default_value_t = 1_000)]
    pub block_time_ms: u64,
    /// Whether to enable lazy aggregation. In lazy mode, empty batches don't produce blocks
    /// until [`NodeOpts::lazy_block_time_ms`] has elapsed since the last block.
    #[clap(long = "node.lazy-mode", env = "LUMEN_LAZY_MODE", default_value_t = false)]
    pub lazy_mode: bool,
    /// The maximum time between two blocks in lazy mode (in milliseconds).
    #[clap(
        long = "node.lazy-block-time-ms",
        env = "LUMEN_LAZY_BLOCK_TIME_MS",
        default_value_t = 60_000
    )]
    pub lazy_block_time_ms: u64,
    /// The maximum number of produced blocks not yet included in the DA layer. Block
    /// production pauses when the bound is reached. Zero disables the bound.
    #[clap(long = "node.max-pending-blocks", env = "LUMEN_MAX_PENDING_BLOCKS", default_value_t = 0)]
    pub max_pending_blocks: u64,
    /// The timeout applied to every call to the executor, sequencer and DA layer
    /// (in milliseconds).
    #[clap(
        long = "node.collaborator-timeout-ms",
        env = "LUMEN_COLLABORATOR_TIMEOUT_MS",
        default_value_t = 10_000
    )]
    pub collaborator_timeout_ms: u64,
}

impl NodeOpts {
    /// Returns the block time.
    pub const fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// Returns the lazy block time.
    pub const fn lazy_block_time(&self) -> Duration {
        Duration::from_millis(self.lazy_block_time_ms)
    }

    /// Returns the collaborator timeout.
    pub const fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}
