use std::time::Duration;

use clap::Parser;

/// Data availability layer configuration options
#[derive(Debug, Clone, Parser)]
pub struct DaOpts {
    /// The interval between two header submissions to the DA layer (in milliseconds).
    #[clap(
        id = "da_block_time_ms",
        long = "da.block-time-ms",
        env = "LUMEN_DA_BLOCK_TIME_MS",
        default_value_t = 6_000
    )]
    pub block_time_ms: u64,
    /// The interval between two inclusion queries to the DA layer (in milliseconds).
    #[clap(
        long = "da.poll-interval-ms",
        env = "LUMEN_DA_POLL_INTERVAL_MS",
        default_value_t = 3_000
    )]
    pub poll_interval_ms: u64,
    /// The maximum number of headers sent in a single submission.
    #[clap(
        long = "da.max-submit-headers",
        env = "LUMEN_DA_MAX_SUBMIT_HEADERS",
        default_value_t = 64
    )]
    pub max_submit_headers: usize,
    /// The maximum size of the serialized headers sent in a single submission, in bytes.
    /// A submission always carries at least one header.
    ///
    /// ### Default value
    ///
    /// Slightly below the usual 2MB blob limit of DA layers.
    #[clap(
        long = "da.max-submit-bytes",
        env = "LUMEN_DA_MAX_SUBMIT_BYTES",
        default_value_t = 1_900_000
    )]
    pub max_submit_bytes: usize,
    /// The upper bound of the exponential backoff applied after a failed DA call
    /// (in milliseconds).
    #[clap(long = "da.max-backoff-ms", env = "LUMEN_DA_MAX_BACKOFF_MS", default_value_t = 30_000)]
    pub max_backoff_ms: u64,
    /// The maximum size of a blob accepted by the local DA layer, in bytes.
    #[clap(
        long = "da.local-max-blob-size",
        env = "LUMEN_DA_LOCAL_MAX_BLOB_SIZE",
        default_value_t = 100_000
    )]
    pub local_max_blob_size: usize,
}

impl DaOpts {
    /// Returns the DA submission interval.
    pub const fn block_time(&self) -> Duration {
        Duration::from_millis(self.block_time_ms)
    }

    /// Returns the DA inclusion poll interval.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Returns the maximum backoff.
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
