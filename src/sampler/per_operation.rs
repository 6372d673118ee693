use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::sampler::guaranteed::GuaranteedThroughputProbabilisticSampler;
use crate::sampler::remote::strategies::PerOperationSamplingStrategies;
use crate::sampler::{ProbabilisticSampler, Sampler, SamplingStatus};
use crate::trace_id::TraceId;

#[derive(Debug)]
struct PerOperationState {
    samplers: HashMap<String, GuaranteedThroughputProbabilisticSampler>,
    default_sampler: ProbabilisticSampler,
    default_lower_bound: f64,
}

/// An adaptive sampler that keeps an independent
/// [`GuaranteedThroughputProbabilisticSampler`] per operation name.
///
/// The map is bounded: once `max_operations` distinct operations have
/// been seen, further operations share a plain probabilistic default
/// sampler and get no lower-bound guarantee.
///
/// Readers take a read lock; the map only takes the write lock to admit
/// a new operation or to apply a strategy update.
#[derive(Debug)]
pub struct PerOperationSampler {
    max_operations: usize,
    state: RwLock<PerOperationState>,
}

impl PerOperationSampler {
    /// Build a sampler from a strategies message. Per-operation rates
    /// are clamped to `[0, 1]`; at most `max_operations` entries are
    /// retained.
    pub fn new(strategies: &PerOperationSamplingStrategies, max_operations: usize) -> Self {
        let mut samplers = HashMap::with_capacity(max_operations.min(64));
        for strategy in strategies.per_operation_strategies.iter().take(max_operations) {
            samplers.insert(
                strategy.operation.clone(),
                GuaranteedThroughputProbabilisticSampler::new(
                    strategies.default_lower_bound_traces_per_second,
                    strategy.probabilistic_sampling.sampling_rate,
                ),
            );
        }
        PerOperationSampler {
            max_operations,
            state: RwLock::new(PerOperationState {
                samplers,
                default_sampler: ProbabilisticSampler::new(
                    strategies.default_sampling_probability,
                ),
                default_lower_bound: strategies.default_lower_bound_traces_per_second,
            }),
        }
    }

    /// Apply a new strategies message: listed operations are updated in
    /// place or created (respecting the size bound), operations no
    /// longer listed are removed, and the defaults for future
    /// operations are refreshed. Concurrent readers observe either the
    /// old or the new state, never a mixture.
    pub fn update(&self, strategies: &PerOperationSamplingStrategies) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let lower_bound = strategies.default_lower_bound_traces_per_second;
        state.default_sampler =
            ProbabilisticSampler::new(strategies.default_sampling_probability);
        state.default_lower_bound = lower_bound;

        let listed: HashSet<&str> = strategies
            .per_operation_strategies
            .iter()
            .map(|strategy| strategy.operation.as_str())
            .collect();
        state
            .samplers
            .retain(|operation, _| listed.contains(operation.as_str()));

        for strategy in &strategies.per_operation_strategies {
            let rate = strategy.probabilistic_sampling.sampling_rate;
            if let Some(sampler) = state.samplers.get(&strategy.operation) {
                sampler.update(lower_bound, rate);
            } else if state.samplers.len() < self.max_operations {
                state.samplers.insert(
                    strategy.operation.clone(),
                    GuaranteedThroughputProbabilisticSampler::new(lower_bound, rate),
                );
            }
        }
    }

    #[cfg(test)]
    fn operation_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .samplers
            .len()
    }

    #[cfg(test)]
    fn sampling_rate_of(&self, operation: &str) -> Option<f64> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .samplers
            .get(operation)
            .map(GuaranteedThroughputProbabilisticSampler::sampling_rate)
    }
}

impl Sampler for PerOperationSampler {
    fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(sampler) = state.samplers.get(operation_name) {
                return sampler.is_sampled(trace_id, operation_name);
            }
            if state.samplers.len() >= self.max_operations {
                return state.default_sampler.is_sampled(trace_id, operation_name);
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.samplers.contains_key(operation_name) && state.samplers.len() < self.max_operations
        {
            let sampler = GuaranteedThroughputProbabilisticSampler::new(
                state.default_lower_bound,
                state.default_sampler.sampling_rate(),
            );
            state.samplers.insert(operation_name.to_string(), sampler);
        }
        match state.samplers.get(operation_name) {
            Some(sampler) => sampler.is_sampled(trace_id, operation_name),
            // lost the race against an update that filled the map
            None => state.default_sampler.is_sampled(trace_id, operation_name),
        }
    }
}
