use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::status::PipelineStatus;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ManagerMetrics;

impl ManagerMetrics {
    // ################ COUNTERS ################ //

    // ============= CHAIN STATE ================ //

    /// Sets the height of the last produced block
    pub(crate) fn set_last_block_height(value: u64) {
        counter!("manager_last_block_height").absolute(value);
    }

    /// Sets the height of the last header accepted by the DA layer
    pub(crate) fn set_last_submitted_height(value: u64) {
        counter!("manager_last_submitted_height").absolute(value);
    }

    /// Sets the height of the last header confirmed by the DA layer
    pub(crate) fn set_da_included_height(value: u64) {
        counter!("manager_da_included_height").absolute(value);
    }

    // ============ BLOCKS ================ //

    /// Increments the amount of blocks produced
    pub(crate) fn increment_blocks_produced() {
        counter!("manager_blocks_produced").increment(1);
    }

    /// Increments the amount of production ticks skipped because of the pending bound
    pub(crate) fn increment_backpressure_pauses() {
        counter!("manager_backpressure_pauses").increment(1);
    }

    /// Increments the amount of empty batches skipped in lazy mode
    pub(crate) fn increment_empty_batches_skipped() {
        counter!("manager_empty_batches_skipped").increment(1);
    }

    /// Increments the amount of block production failures by reason
    pub(crate) fn increment_block_production_failures(reason: &'static str) {
        counter!("manager_block_production_failures", "reason" => reason).increment(1);
    }

    /// Increments the amount of failed header broadcasts
    pub(crate) fn increment_gossip_failures() {
        counter!("manager_gossip_failures").increment(1);
    }

    // ============ DA ================ //

    /// Increments the amount of headers accepted by the DA layer
    pub(crate) fn increment_headers_submitted(count: u64) {
        counter!("manager_headers_submitted").increment(count);
    }

    /// Increments the amount of DA submission failures by reason
    pub(crate) fn increment_submission_failures(reason: &'static str) {
        counter!("manager_submission_failures", "reason" => reason).increment(1);
    }

    /// Increments the amount of failed DA inclusion queries by reason
    pub(crate) fn increment_inclusion_query_failures(reason: &'static str) {
        counter!("manager_inclusion_query_failures", "reason" => reason).increment(1);
    }

    /// Increments the amount of stale DA inclusion answers
    pub(crate) fn increment_stale_inclusion_reads() {
        counter!("manager_stale_inclusion_reads").increment(1);
    }

    /// Increments the amount of failed finality notifications
    pub(crate) fn increment_finality_notification_failures() {
        counter!("manager_finality_notification_failures").increment(1);
    }

    // ################ GAUGES ################ //

    /// Sets the version of the Lumen node.
    pub(crate) fn set_lumen_version(tag: String) {
        gauge!("manager_lumen_version", "tag" => tag).set(1.0);
    }

    /// Sets the amount of headers waiting for submission or confirmation
    pub(crate) fn set_pending_headers(queued: usize, unsubmitted: usize) {
        gauge!("manager_pending_headers").set(queued as f64);
        gauge!("manager_unsubmitted_headers").set(unsubmitted as f64);
    }

    /// Sets the amount of transactions included in the last block
    pub(crate) fn set_block_tx_count(value: usize) {
        gauge!("manager_block_tx_count").set(value as f64);
    }

    /// Sets the status of the pipeline.
    pub(crate) fn set_pipeline_status(status: PipelineStatus) {
        let displayed = format!("{status}");

        for other in PipelineStatus::variant_names() {
            let other = other.to_string();
            if other == displayed {
                // Don't temporarily set the current status to 0.
                continue;
            }
            gauge!("manager_pipeline_status", "status" => other).set(0);
        }

        gauge!("manager_pipeline_status", "status" => displayed).set(1);
    }

    // ################ HISTOGRAMS ################ //

    /// Records the time it took to produce a block, from batch request to commit
    pub(crate) fn record_block_production_time(time_elapsed: Duration) {
        histogram!("manager_block_production_time").record(time_elapsed.as_secs_f64());
    }

    /// Records the time it took the DA layer to answer a submission
    pub(crate) fn record_submission_time(time_elapsed: Duration) {
        histogram!("manager_da_submission_time").record(time_elapsed.as_secs_f64());
    }

    /// Records the size of a DA submission, in bytes
    pub(crate) fn record_submission_size(bytes: usize) {
        histogram!("manager_da_submission_size_bytes").record(bytes as f64);
    }
}
