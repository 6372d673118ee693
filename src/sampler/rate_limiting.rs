use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::sampler::{sampler_tags, Sampler, SamplingStatus, SAMPLER_TYPE_RATE_LIMITING};
use crate::tag::Tag;
use crate::trace_id::TraceId;

/// A credit-accumulating rate limiter.
///
/// Credits accrue continuously at `credits_per_second` between
/// withdrawals, capped at `max_balance`; a withdrawal succeeds when a
/// full credit is available. Sub-second precision comes from the
/// fractional elapsed time, so rates below one per second work.
#[derive(Debug)]
pub(crate) struct TokenBucket {
    credits_per_second: f64,
    max_balance: f64,
    balance: f64,
    last_tick: Instant,
}

impl TokenBucket {
    pub(crate) fn new(credits_per_second: f64, max_balance: f64) -> Self {
        TokenBucket {
            credits_per_second,
            max_balance,
            balance: max_balance,
            last_tick: Instant::now(),
        }
    }

    pub(crate) fn check_credit(&mut self, cost: f64) -> bool {
        self.check_credit_at(cost, Instant::now())
    }

    fn check_credit_at(&mut self, cost: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.balance =
            (self.balance + elapsed.as_secs_f64() * self.credits_per_second).min(self.max_balance);
        if self.balance >= cost {
            self.balance -= cost;
            true
        } else {
            false
        }
    }
}

/// A sampler admitting at most a configured number of traces per
/// second, via a [`TokenBucket`] sized so that a single trace can
/// always be admitted in steady state.
#[derive(Debug)]
pub struct RateLimitingSampler {
    max_traces_per_second: f64,
    bucket: Mutex<TokenBucket>,
    tags: Vec<Tag>,
}

impl RateLimitingSampler {
    /// Create a sampler admitting `max_traces_per_second` traces per
    /// second. Fractional rates are meaningful: `0.1` admits one trace
    /// every ten seconds.
    pub fn new(max_traces_per_second: f64) -> Self {
        let max_balance = max_traces_per_second.max(1.0);
        RateLimitingSampler {
            max_traces_per_second,
            bucket: Mutex::new(TokenBucket::new(max_traces_per_second, max_balance)),
            tags: sampler_tags(SAMPLER_TYPE_RATE_LIMITING, max_traces_per_second),
        }
    }

    /// The configured rate.
    pub fn max_traces_per_second(&self) -> f64 {
        self.max_traces_per_second
    }
}

impl Sampler for RateLimitingSampler {
    fn is_sampled(&self, _trace_id: TraceId, _operation_name: &str) -> SamplingStatus {
        let sampled = self
            .bucket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_credit(1.0);
        SamplingStatus::new(sampled, self.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bucket_accrues_and_caps_credit() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(0.1, 2.0);
        bucket.last_tick = start;
        bucket.balance = 2.0;

        // (seconds since start, expected outcomes)
        let cases = [
            (0u64, vec![true, true, false]),
            (1, vec![false]),
            (5, vec![false]),
            (10, vec![true, false]),
            (60, vec![true, true, false]), // balance is capped at 2
        ];
        for (elapsed, outcomes) in cases {
            for expected in outcomes {
                assert_eq!(
                    bucket.check_credit_at(1.0, start + Duration::from_secs(elapsed)),
                    expected,
                    "at t={}s",
                    elapsed
                );
            }
        }
    }

    #[test]
    fn bucket_tolerates_non_monotonic_observations() {
        let start = Instant::now();
        let mut bucket = TokenBucket::new(0.1, 2.0);
        bucket.last_tick = start + Duration::from_secs(10);
        bucket.balance = 1.0;
        // an earlier instant accrues nothing but still withdraws
        assert!(bucket.check_credit_at(1.0, start));
        assert!(!bucket.check_credit_at(1.0, start));
    }

    #[test]
    fn admits_bursts_up_to_the_rate() {
        let sampler = RateLimitingSampler::new(2.0);
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(!sampler.is_sampled(TraceId::default(), "op").is_sampled());
    }

    #[test]
    fn fractional_rate_admits_a_single_trace() {
        let sampler = RateLimitingSampler::new(0.1);
        assert!(sampler.is_sampled(TraceId::default(), "op").is_sampled());
        assert!(!sampler.is_sampled(TraceId::default(), "op").is_sampled());
    }

    #[test]
    fn accepted_count_is_bounded_over_a_window() {
        // simulate 10 seconds at 2/s with continuous offered load
        let start = Instant::now();
        let mut bucket = TokenBucket::new(2.0, 2.0);
        bucket.last_tick = start;
        let mut accepted = 0u32;
        for millis in (0..10_000).step_by(50) {
            if bucket.check_credit_at(1.0, start + Duration::from_millis(millis)) {
                accepted += 1;
            }
        }
        // ceil(2/s * 10s) + max balance
        assert!(accepted <= 22, "accepted {} traces", accepted);
        assert!(accepted >= 20, "accepted {} traces", accepted);
    }
}
