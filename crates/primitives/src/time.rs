use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// A UNIX timestamp in milliseconds.
pub type Timestamp = u64;

/// Get the current UNIX timestamp in milliseconds.
pub fn current_timestamp_ms() -> Timestamp {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as Timestamp
}

/// Returns the timestamp for a block built on top of a block with timestamp `last`.
///
/// Block timestamps are strictly increasing even if the wall clock stalls or jumps back.
pub fn next_block_timestamp(last: Timestamp) -> Timestamp {
    current_timestamp_ms().max(last + 1)
}

/// Returns the time elapsed between `since` and now, saturating at zero.
pub fn elapsed_since(since: Timestamp) -> Duration {
    Duration::from_millis(current_timestamp_ms().saturating_sub(since))
}

/// Creates an interval ticking every `period`, with the first tick completing after one
/// full period.
///
/// Missed ticks are skipped, avoiding unnecessary bursts when a step took longer than
/// the period.
pub fn skipping_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::FutureExt as _;

    #[test]
    fn block_timestamps_strictly_increase() {
        let far_future = current_timestamp_ms() + 60_000;

        assert_eq!(next_block_timestamp(far_future), far_future + 1);
        assert!(next_block_timestamp(0) >= current_timestamp_ms() - 1_000);
    }

    #[tokio::test]
    async fn test_interval_skips_missed_ticks() {
        let period = Duration::from_millis(50);
        let mut interval = skipping_interval(period);

        let start = Instant::now();
        interval.tick().await;
        assert!(start.elapsed() >= Duration::from_millis(40));

        // Simulate a slow step that would cause multiple ticks to be missed
        tokio::time::sleep(Duration::from_millis(225)).await;

        // The missed ticks collapse into a single ready tick
        assert!(interval.tick().now_or_never().is_some());
        assert!(interval.tick().now_or_never().is_none());
    }
}
