use std::time::Duration;

use alloy_primitives::Address;
use lumen_config::Opts;
use lumen_primitives::{state::Genesis, summary::Summary, time::current_timestamp_ms};

use crate::error::ManagerError;

/// The configuration of the [`BlockManager`](crate::BlockManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Whether this node produces blocks.
    pub aggregator: bool,
    /// The interval between two block production attempts.
    pub block_time: Duration,
    /// Whether empty batches are skipped until `lazy_block_time` has elapsed.
    pub lazy_mode: bool,
    /// The maximum time between two blocks in lazy mode.
    pub lazy_block_time: Duration,
    /// The interval between two DA submissions.
    pub da_block_time: Duration,
    /// The interval between two DA inclusion queries.
    pub da_poll_interval: Duration,
    /// The maximum number of blocks not yet included in the DA layer. Zero disables the bound.
    pub max_pending_blocks: u64,
    /// The maximum number of headers per DA submission.
    pub max_submit_headers: usize,
    /// The maximum size of the serialized headers of a DA submission, in bytes.
    pub max_submit_bytes: usize,
    /// The timeout applied to every executor, sequencer and DA call.
    pub collaborator_timeout: Duration,
    /// The upper bound of the backoff applied after a transient failure.
    pub max_backoff: Duration,
    /// The identity written in produced headers.
    pub proposer: Address,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            aggregator: true,
            block_time: Duration::from_secs(1),
            lazy_mode: false,
            lazy_block_time: Duration::from_secs(60),
            da_block_time: Duration::from_secs(6),
            da_poll_interval: Duration::from_secs(3),
            max_pending_blocks: 0,
            max_submit_headers: 64,
            max_submit_bytes: 1_900_000,
            collaborator_timeout: Duration::from_secs(10),
            max_backoff: Duration::from_secs(30),
            proposer: Address::ZERO,
        }
    }
}

impl ManagerConfig {
    /// Checks that the configuration can drive the manager loops.
    pub(crate) fn validate(&self) -> Result<(), ManagerError> {
        let intervals = [
            ("block time", self.block_time),
            ("DA block time", self.da_block_time),
            ("DA poll interval", self.da_poll_interval),
            ("collaborator timeout", self.collaborator_timeout),
        ];

        if let Some((name, _)) = intervals.iter().find(|(_, d)| d.is_zero()) {
            return Err(ManagerError::InvalidConfig(format!("{name} must be greater than zero")));
        }

        if self.lazy_mode && self.lazy_block_time < self.block_time {
            return Err(ManagerError::InvalidConfig(
                "lazy block time must not be shorter than the block time".to_owned(),
            ));
        }

        if self.max_submit_headers == 0 {
            return Err(ManagerError::InvalidConfig(
                "max submit headers must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

impl From<&Opts> for ManagerConfig {
    fn from(opts: &Opts) -> Self {
        Self {
            aggregator: opts.node.aggregator,
            block_time: opts.node.block_time(),
            lazy_mode: opts.node.lazy_mode,
            lazy_block_time: opts.node.lazy_block_time(),
            da_block_time: opts.da.block_time(),
            da_poll_interval: opts.da.poll_interval(),
            max_pending_blocks: opts.node.max_pending_blocks,
            max_submit_headers: opts.da.max_submit_headers,
            max_submit_bytes: opts.da.max_submit_bytes,
            collaborator_timeout: opts.node.collaborator_timeout(),
            max_backoff: opts.da.max_backoff(),
            proposer: opts.chain.proposer,
        }
    }
}

/// Builds the genesis descriptor from the CLI options. The genesis time defaults to now.
pub fn genesis_from_opts(opts: &Opts) -> Genesis {
    Genesis {
        chain_id: opts.chain.chain_id.clone(),
        initial_height: opts.chain.initial_height,
        genesis_time: opts.chain.genesis_time_ms.unwrap_or_else(current_timestamp_ms),
        proposer: opts.chain.proposer,
    }
}

impl Summary for ManagerConfig {
    fn summary(&self) -> String {
        format!(
            "Running with the following configuration:
            - Role: aggregator={}, proposer={}
            - Blocks: block_time={:?}, lazy_mode={}, lazy_block_time={:?}
            - DA: block_time={:?}, poll_interval={:?}, max_headers={}, max_bytes={}b
            - Flow control: max_pending_blocks={}, timeout={:?}, max_backoff={:?}
            ",
            self.aggregator,
            self.proposer,
            self.block_time,
            self.lazy_mode,
            self.lazy_block_time,
            self.da_block_time,
            self.da_poll_interval,
            self.max_submit_headers,
            self.max_submit_bytes,
            self.max_pending_blocks,
            self.collaborator_timeout,
            self.max_backoff,
        )
    }
}
