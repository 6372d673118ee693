//! Wire model of the sampling manager's strategy response.
//!
//! The response is a union in spirit: exactly one of the strategy
//! payloads is expected to be present, and `operation_sampling` wins
//! when several are. `strategy_type` is a legacy discriminator kept for
//! compatibility with producers that still set it.

/// Fixed-probability strategy payload.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbabilisticSamplingStrategy {
    /// Sampling probability in `[0.0, 1.0]`.
    pub sampling_rate: f64,
}

/// Rate-limited strategy payload.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitingSamplingStrategy {
    /// Maximum number of traces to admit per second.
    pub max_traces_per_second: f64,
}

/// Strategy for a single operation within a service.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationSamplingStrategy {
    /// Operation (root span) name.
    pub operation: String,
    /// Probability to apply to this operation.
    pub probabilistic_sampling: ProbabilisticSamplingStrategy,
}

/// Per-operation strategies plus service-wide defaults.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerOperationSamplingStrategies {
    /// Probability for operations without an explicit strategy.
    pub default_sampling_probability: f64,
    /// Guaranteed minimum sampling rate, in traces per second, applied
    /// to every tracked operation.
    pub default_lower_bound_traces_per_second: f64,
    /// Strategies for individual operations.
    #[serde(default)]
    pub per_operation_strategies: Vec<OperationSamplingStrategy>,
    /// Upper bound rate limit. Almost no client honors it; parsed and
    /// ignored.
    #[serde(default)]
    pub default_upper_bound_traces_per_second: f64,
}

/// Legacy discriminator, see [`SamplingStrategyResponse::strategy_type`].
#[derive(serde::Serialize, serde::Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SamplingStrategyType {
    /// Probabilistic strategy.
    #[default]
    Probabilistic,
    /// Rate limiting strategy.
    RateLimiting,
}

/// The overall sampling strategy for one service.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingStrategyResponse {
    /// Legacy field naming the strategy kind. It predates per-operation
    /// strategies and cannot represent them, so consumers check the
    /// payload fields instead.
    #[serde(default)]
    pub strategy_type: SamplingStrategyType,
    /// Present for probabilistic strategies.
    pub probabilistic_sampling: Option<ProbabilisticSamplingStrategy>,
    /// Present for rate-limiting strategies.
    pub rate_limiting_sampling: Option<RateLimitingSamplingStrategy>,
    /// Present for per-operation strategies.
    pub operation_sampling: Option<PerOperationSamplingStrategies>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_probabilistic_response() {
        let json = r#"{
            "strategyType": "PROBABILISTIC",
            "probabilisticSampling": {
                "samplingRate": 0.5
            }
        }"#;
        let response: SamplingStrategyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.strategy_type, SamplingStrategyType::Probabilistic);
        assert_eq!(
            response.probabilistic_sampling.unwrap().sampling_rate,
            0.5
        );
        assert!(response.rate_limiting_sampling.is_none());
        assert!(response.operation_sampling.is_none());
    }

    #[test]
    fn deserialize_rate_limiting_response() {
        let json = r#"{
            "strategyType": "RATE_LIMITING",
            "rateLimitingSampling": {
                "maxTracesPerSecond": 100
            }
        }"#;
        let response: SamplingStrategyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.strategy_type, SamplingStrategyType::RateLimiting);
        assert_eq!(
            response.rate_limiting_sampling.unwrap().max_traces_per_second,
            100.0
        );
    }

    #[test]
    fn deserialize_per_operation_response() {
        let json = r#"{
            "strategyType": "PROBABILISTIC",
            "operationSampling": {
                "defaultSamplingProbability": 0.25,
                "defaultLowerBoundTracesPerSecond": 2.0,
                "perOperationStrategies": [
                    {
                        "operation": "op",
                        "probabilisticSampling": { "samplingRate": 0.75 }
                    }
                ]
            }
        }"#;
        let response: SamplingStrategyResponse = serde_json::from_str(json).unwrap();
        let operations = response.operation_sampling.unwrap();
        assert_eq!(operations.default_sampling_probability, 0.25);
        assert_eq!(operations.default_lower_bound_traces_per_second, 2.0);
        assert_eq!(operations.per_operation_strategies.len(), 1);
        assert_eq!(operations.per_operation_strategies[0].operation, "op");
    }
}
