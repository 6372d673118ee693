//! Counters surfaced by the sampling and reporting pipeline.
//!
//! The hot paths never return errors; these counters are the only way
//! drops and background failures become observable. A metrics backend
//! can scrape them, tests assert on them.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Increment by one.
    pub fn inc(&self) {
        self.add(1);
    }

    /// Increment by `n`.
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counter block shared by samplers and reporters.
///
/// Constructed once per tracer and handed to each component explicitly;
/// there is no process-wide default.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Spans accepted into the reporter queue.
    pub spans_submitted: Counter,
    /// Spans dropped because the queue was full or the reporter closed.
    pub spans_dropped: Counter,
    /// Spans successfully handed to the agent.
    pub spans_flushed: Counter,
    /// Spans lost to transport failures.
    pub spans_failed: Counter,
    /// Spans rejected because they can never fit in a datagram.
    pub spans_too_large: Counter,
    /// Sampling strategy polls attempted.
    pub sampler_queries: Counter,
    /// Sampling strategy polls that failed at the transport level.
    pub sampler_query_failures: Counter,
    /// Sampling strategy responses applied.
    pub sampler_updates: Counter,
    /// Sampling strategy responses that could not be decoded or applied.
    pub sampler_update_failures: Counter,
}

impl Metrics {
    /// Create a zeroed counter block.
    pub fn new() -> Self {
        Metrics::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = Metrics::new();
        metrics.spans_submitted.inc();
        metrics.spans_submitted.add(2);
        assert_eq!(metrics.spans_submitted.get(), 3);
        assert_eq!(metrics.spans_dropped.get(), 0);
    }
}
