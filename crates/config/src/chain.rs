use std::path::PathBuf;

use alloy_primitives::Address;
use clap::Parser;

/// The genesis configuration for the chain.
#[derive(Debug, Clone, Parser)]
pub struct ChainOpts {
    /// The chain id.
    #[clap(long = "chain.id", env = "LUMEN_CHAIN_ID", default_value = "lumen-devnet")]
    pub chain_id: String,
    /// The height of the first block of the chain.
    #[clap(
        long = "chain.initial-height",
        env = "LUMEN_INITIAL_HEIGHT",
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub initial_height: u64,
    /// The genesis time, in UNIX milliseconds. Defaults to the node start time.
    #[clap(long = "chain.genesis-time-ms", env = "LUMEN_GENESIS_TIME_MS")]
    pub genesis_time_ms: Option<u64>,
    /// The address of the aggregator, written in every produced header.
    #[clap(long = "chain.proposer", env = "LUMEN_PROPOSER", default_value_t = Address::ZERO)]
    pub proposer: Address,
}

/// Storage configuration options
#[derive(Debug, Clone, Parser)]
pub struct StoreOpts {
    /// The directory where blocks and the chain state are persisted.
    #[clap(long = "store.path", env = "LUMEN_STORE_PATH", default_value = "./lumen-data")]
    pub path: PathBuf,
}
