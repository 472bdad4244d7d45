//! Replay Tuning
//!
//! Knobs for the read-ahead pipeline and the timer's reaction latency.
//! Defaults suit traces in the hundreds of thousands of events; tests
//! shrink them to keep runs short.

use std::time::Duration;

/// Configuration for a replay session.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Events per batch handed from the loader to the timer. Larger
    /// batches reduce queue contention at the cost of memory.
    pub batch_size: usize,
    /// Batch-queue capacity. The loader runs ahead of the timer by at
    /// most `queue_len * batch_size` events.
    pub queue_len: usize,
    /// Wall pause between loader start and wall-clock anchoring, so the
    /// queue is primed before the schedule begins.
    pub priming_delay: Duration,
    /// Upper bound on a single timer sleep before control signals are
    /// re-checked. Bounds quit/pause reaction latency.
    pub max_sleep_chunk: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            queue_len: 5,
            priming_delay: Duration::from_secs(1),
            max_sleep_chunk: Duration::from_millis(250),
        }
    }
}
