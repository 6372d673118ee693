use std::sync::{Mutex, PoisonError};

use crate::sampler::rate_limiting::TokenBucket;
use crate::sampler::{
    sampler_tags, ProbabilisticSampler, Sampler, SamplingStatus, SAMPLER_TYPE_LOWER_BOUND,
};
use crate::trace_id::TraceId;

#[derive(Debug)]
struct GuaranteedThroughputState {
    probabilistic: ProbabilisticSampler,
    lower_bound: f64,
    bucket: TokenBucket,
}

fn lower_bound_bucket(lower_bound: f64) -> TokenBucket {
    TokenBucket::new(lower_bound, lower_bound.max(1.0))
}

/// A probabilistic sampler with a guaranteed minimum throughput.
///
/// The probabilistic decision is tried first; traces it rejects may
/// still be admitted by a token bucket of `lower_bound` credits per
/// second, so an operation is sampled at least `lower_bound` times per
/// second even when its probabilistic rate rounds to nothing.
///
/// Probabilistically sampled traces also drain the bucket, which keeps
/// the combined rate close to `max(rate, lower_bound)` instead of their
/// sum.
#[derive(Debug)]
pub struct GuaranteedThroughputProbabilisticSampler {
    state: Mutex<GuaranteedThroughputState>,
}

impl GuaranteedThroughputProbabilisticSampler {
    /// Create a sampler with the given lower bound (traces per second)
    /// and probabilistic sampling rate.
    pub fn new(lower_bound: f64, sampling_rate: f64) -> Self {
        GuaranteedThroughputProbabilisticSampler {
            state: Mutex::new(GuaranteedThroughputState {
                probabilistic: ProbabilisticSampler::new(sampling_rate),
                lower_bound,
                bucket: lower_bound_bucket(lower_bound),
            }),
        }
    }

    /// Replace the sampling rate and lower bound. Only the parts that
    /// changed are rebuilt; replacing the bucket resets its balance,
    /// which converges to the new bound within a second.
    pub fn update(&self, lower_bound: f64, sampling_rate: f64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.probabilistic.sampling_rate() != sampling_rate {
            state.probabilistic = ProbabilisticSampler::new(sampling_rate);
        }
        if state.lower_bound != lower_bound {
            state.bucket = lower_bound_bucket(lower_bound);
            state.lower_bound = lower_bound;
        }
    }

    /// The guaranteed throughput in traces per second.
    pub fn lower_bound(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lower_bound
    }

    /// The effective probabilistic sampling rate.
    pub fn sampling_rate(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .probabilistic
            .sampling_rate()
    }
}

impl Sampler for GuaranteedThroughputProbabilisticSampler {
    fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let status = state.probabilistic.is_sampled(trace_id, operation_name);
        if status.is_sampled() {
            state.bucket.check_credit(1.0);
            return status;
        }
        if state.bucket.check_credit(1.0) {
            let rate = state.probabilistic.sampling_rate();
            return SamplingStatus::new(true, sampler_tags(SAMPLER_TYPE_LOWER_BOUND, rate));
        }
        status
    }
}
