//! Sampling policies.
//!
//! A sampler is consulted once, when a root span is created, and its
//! decision travels with the trace from then on. The leaf policies in
//! this module are cheap and lock-free or nearly so; the composed ones
//! ([`PerOperationSampler`], [`RemoteSampler`]) build on them.

pub(crate) mod guaranteed;
pub(crate) mod per_operation;
pub(crate) mod rate_limiting;
pub(crate) mod remote;

use std::fmt;

use crate::tag::Tag;
use crate::trace_id::TraceId;

pub use guaranteed::GuaranteedThroughputProbabilisticSampler;
pub use per_operation::PerOperationSampler;
pub use rate_limiting::RateLimitingSampler;
pub use remote::strategies::{
    OperationSamplingStrategy, PerOperationSamplingStrategies, ProbabilisticSamplingStrategy,
    RateLimitingSamplingStrategy, SamplingStrategyResponse, SamplingStrategyType,
};
pub use remote::{RemoteSampler, RemoteSamplerBuilder};

/// Tag key reporting which sampler made the decision.
pub const SAMPLER_TYPE_TAG_KEY: &str = "sampler.type";
/// Tag key reporting the sampler's parameter.
pub const SAMPLER_PARAM_TAG_KEY: &str = "sampler.param";

/// `sampler.type` value of [`ConstSampler`].
pub const SAMPLER_TYPE_CONST: &str = "const";
/// `sampler.type` value of [`ProbabilisticSampler`].
pub const SAMPLER_TYPE_PROBABILISTIC: &str = "probabilistic";
/// `sampler.type` value of [`RateLimitingSampler`].
pub const SAMPLER_TYPE_RATE_LIMITING: &str = "ratelimiting";
/// `sampler.type` value of the lower-bound path of
/// [`GuaranteedThroughputProbabilisticSampler`].
pub const SAMPLER_TYPE_LOWER_BOUND: &str = "lowerbound";

/// The outcome of a sampling decision.
///
/// Carries the decision plus the pair of tags (`sampler.type`,
/// `sampler.param`) the tracer attaches to sampled root spans.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingStatus {
    sampled: bool,
    tags: Vec<Tag>,
}

impl SamplingStatus {
    /// Create a status from a decision and its explanatory tags.
    pub fn new(sampled: bool, tags: Vec<Tag>) -> Self {
        SamplingStatus { sampled, tags }
    }

    /// Whether the trace should be recorded.
    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Tags describing the deciding sampler.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

pub(crate) fn sampler_tags<V: Into<crate::tag::TagValue>>(
    sampler_type: &'static str,
    param: V,
) -> Vec<Tag> {
    vec![
        Tag::new(SAMPLER_TYPE_TAG_KEY, sampler_type),
        Tag::new(SAMPLER_PARAM_TAG_KEY, param),
    ]
}

/// A sampling decision function.
///
/// Implementations must be cheap and must never block on I/O;
/// `is_sampled` sits on the span-creation hot path.
pub trait Sampler: Send + Sync + fmt::Debug {
    /// Decide whether the trace identified by `trace_id` should be
    /// recorded. `operation_name` is the name of the root span.
    fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus;

    /// Release background resources. Idempotent; the default does
    /// nothing.
    fn close(&self) {}
}

/// A sampler that makes the same decision for every trace.
#[derive(Clone, Debug)]
pub struct ConstSampler {
    decision: bool,
    tags: Vec<Tag>,
}

impl ConstSampler {
    /// Create a sampler answering `decision` for every trace.
    pub fn new(decision: bool) -> Self {
        ConstSampler {
            decision,
            tags: sampler_tags(SAMPLER_TYPE_CONST, decision),
        }
    }

    /// The fixed decision.
    pub fn decision(&self) -> bool {
        self.decision
    }
}

impl Sampler for ConstSampler {
    fn is_sampled(&self, _trace_id: TraceId, _operation_name: &str) -> SamplingStatus {
        SamplingStatus::new(self.decision, self.tags.clone())
    }
}

// Rates scale over the full unsigned 64-bit space and ids at the
// boundary are admitted: rate 0.5 admits exactly the ids whose low
// half is <= 2^63, rate 1.0 admits every id.
const MAX_RANDOM_NUMBER: f64 = u64::MAX as f64;

fn sampling_boundary(sampling_rate: f64) -> u64 {
    (sampling_rate * MAX_RANDOM_NUMBER) as u64
}

/// A sampler that admits a fixed fraction of uniformly-distributed
/// trace ids by thresholding the low 64 bits.
#[derive(Clone, Debug)]
pub struct ProbabilisticSampler {
    sampling_rate: f64,
    boundary: u64,
    tags: Vec<Tag>,
}

impl ProbabilisticSampler {
    /// Create a sampler admitting roughly `sampling_rate` of all
    /// traces. Rates outside `[0, 1]` are clamped, not rejected.
    pub fn new(sampling_rate: f64) -> Self {
        let clamped = sampling_rate.clamp(0.0, 1.0);
        if clamped != sampling_rate {
            log::warn!(
                "sampling rate {} is outside [0, 1], using {}",
                sampling_rate,
                clamped
            );
        }
        ProbabilisticSampler {
            sampling_rate: clamped,
            boundary: sampling_boundary(clamped),
            tags: sampler_tags(SAMPLER_TYPE_PROBABILISTIC, clamped),
        }
    }

    /// The effective (clamped) sampling rate.
    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub(crate) fn decide(&self, trace_id: TraceId) -> bool {
        trace_id.low() <= self.boundary
    }
}

impl Sampler for ProbabilisticSampler {
    fn is_sampled(&self, trace_id: TraceId, _operation_name: &str) -> SamplingStatus {
        SamplingStatus::new(self.decide(trace_id), self.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagValue;
    use rand::Rng;

    // one above the midpoint of the id space
    pub(crate) const TEST_MAX_ID: u64 = u64::MAX / 2 + 1;

    fn tag_value<'a>(status: &'a SamplingStatus, key: &str) -> &'a TagValue {
        status
            .tags()
            .iter()
            .find(|tag| tag.key() == key)
            .map(Tag::value)
            .unwrap_or_else(|| panic!("missing tag {}", key))
    }

    #[test]
    fn sampler_tags_identify_the_decider() {
        let cases: Vec<(Box<dyn Sampler>, TagValue, TagValue)> = vec![
            (
                Box::new(ConstSampler::new(true)),
                TagValue::from("const"),
                TagValue::from(true),
            ),
            (
                Box::new(ConstSampler::new(false)),
                TagValue::from("const"),
                TagValue::from(false),
            ),
            (
                Box::new(ProbabilisticSampler::new(0.1)),
                TagValue::from("probabilistic"),
                TagValue::from(0.1),
            ),
            (
                Box::new(RateLimitingSampler::new(0.1)),
                TagValue::from("ratelimiting"),
                TagValue::from(0.1),
            ),
        ];
        for (sampler, expected_type, expected_param) in cases {
            let status = sampler.is_sampled(TraceId::default(), "op");
            assert_eq!(status.tags().len(), 2);
            assert_eq!(*tag_value(&status, SAMPLER_TYPE_TAG_KEY), expected_type);
            assert_eq!(*tag_value(&status, SAMPLER_PARAM_TAG_KEY), expected_param);
        }
    }

    #[test]
    fn probabilistic_sampler_clamps_invalid_rates() {
        let sampler = ProbabilisticSampler::new(-0.1);
        assert!(sampler.sampling_rate() >= 0.0 && sampler.sampling_rate() <= 1.0);
        let sampler = ProbabilisticSampler::new(1.1);
        assert!(sampler.sampling_rate() >= 0.0 && sampler.sampling_rate() <= 1.0);
        assert_eq!(sampler.sampling_rate(), 1.0);
    }

    #[test]
    fn probabilistic_sampler_thresholds_on_the_low_half() {
        let sampler = ProbabilisticSampler::new(0.5);
        let expected_tags = vec![
            Tag::new(SAMPLER_TYPE_TAG_KEY, "probabilistic"),
            Tag::new(SAMPLER_PARAM_TAG_KEY, 0.5),
        ];

        let status = sampler.is_sampled(TraceId::new(0, TEST_MAX_ID + 10), "op");
        assert!(!status.is_sampled());
        assert_eq!(status.tags(), expected_tags.as_slice());

        let status = sampler.is_sampled(TraceId::new(0, TEST_MAX_ID - 20), "op");
        assert!(status.is_sampled());
        assert_eq!(status.tags(), expected_tags.as_slice());
    }

    #[test]
    fn probabilistic_sampler_extremes() {
        let never = ProbabilisticSampler::new(0.0);
        let always = ProbabilisticSampler::new(1.0);
        let mut rng = rand::thread_rng();
        for _ in 0..1_000 {
            let id = TraceId::new(0, rng.gen::<u64>() | 1);
            assert!(!never.is_sampled(id, "op").is_sampled());
            assert!(always.is_sampled(id, "op").is_sampled());
        }
    }

    #[test]
    fn sampled_fraction_converges_to_the_rate() {
        const SAMPLES: u32 = 100_000;
        let sampler = ProbabilisticSampler::new(0.2);
        let mut rng = rand::thread_rng();
        let mut sampled = 0u32;
        for _ in 0..SAMPLES {
            if sampler
                .is_sampled(TraceId::new(0, rng.gen::<u64>()), "op")
                .is_sampled()
            {
                sampled += 1;
            }
        }
        let fraction = f64::from(sampled) / f64::from(SAMPLES);
        assert!(
            (fraction - 0.2).abs() < 0.02,
            "fraction {} too far from rate",
            fraction
        );
    }
}
