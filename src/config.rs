//! Declarative configuration for samplers and reporters.
//!
//! Mirrors the options tracing deployments usually load from the
//! environment or a config file, and turns them into constructed
//! pipeline components.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::metrics::Metrics;
use crate::reporter::{CompositeReporter, LoggingReporter, RemoteReporter, Reporter};
use crate::sampler::{
    ConstSampler, ProbabilisticSampler, RateLimitingSampler, RemoteSampler, Sampler,
};
use crate::span::Process;
use crate::transport::UdpTransport;

/// Default agent endpoint for span emission.
pub const DEFAULT_AGENT_HOST_PORT: &str = "127.0.0.1:6831";
/// Default sampling manager endpoint.
pub const DEFAULT_SAMPLING_SERVER_URL: &str = "http://localhost:5778/sampling";

const DEFAULT_SAMPLER_PARAM: f64 = 0.001;
const DEFAULT_SAMPLING_REFRESH_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_OPERATIONS: usize = 2000;
const DEFAULT_QUEUE_SIZE: usize = 100;
const DEFAULT_BUFFER_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Which sampling policy to construct.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplerKind {
    /// Same decision for every trace; `param != 0` samples everything.
    Const,
    /// Sample a fixed fraction `param` of traces.
    Probabilistic,
    /// Admit at most `param` traces per second.
    RateLimiting,
    /// Poll a sampling manager; `param` seeds the initial rate.
    Remote,
}

/// Sampler configuration.
#[derive(Clone, Debug)]
pub struct SamplerConfig {
    kind: SamplerKind,
    param: f64,
    sampling_server_url: String,
    sampling_refresh_interval: Duration,
    max_operations: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig {
            kind: SamplerKind::Remote,
            param: DEFAULT_SAMPLER_PARAM,
            sampling_server_url: DEFAULT_SAMPLING_SERVER_URL.to_string(),
            sampling_refresh_interval: DEFAULT_SAMPLING_REFRESH_INTERVAL,
            max_operations: DEFAULT_MAX_OPERATIONS,
        }
    }
}

impl SamplerConfig {
    /// Select the sampler kind.
    pub fn with_kind(mut self, kind: SamplerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Kind-specific parameter, see [`SamplerKind`].
    pub fn with_param(mut self, param: f64) -> Self {
        self.param = param;
        self
    }

    /// Sampling manager endpoint for [`SamplerKind::Remote`].
    pub fn with_sampling_server_url<T: Into<String>>(mut self, url: T) -> Self {
        self.sampling_server_url = url.into();
        self
    }

    /// Poll interval for [`SamplerKind::Remote`].
    pub fn with_sampling_refresh_interval(mut self, interval: Duration) -> Self {
        self.sampling_refresh_interval = interval;
        self
    }

    /// Bound on the per-operation map for [`SamplerKind::Remote`].
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Construct the configured sampler.
    pub fn build(&self, service_name: &str, metrics: Arc<Metrics>) -> Result<Box<dyn Sampler>> {
        Ok(match self.kind {
            SamplerKind::Const => Box::new(ConstSampler::new(self.param != 0.0)),
            SamplerKind::Probabilistic => Box::new(ProbabilisticSampler::new(self.param)),
            SamplerKind::RateLimiting => Box::new(RateLimitingSampler::new(self.param)),
            SamplerKind::Remote => Box::new(
                RemoteSampler::builder(service_name)
                    .with_sampling_server_url(self.sampling_server_url.clone())
                    .with_polling_interval(self.sampling_refresh_interval)
                    .with_initial_sampling_rate(self.param)
                    .with_max_operations(self.max_operations)
                    .with_metrics(metrics)
                    .build()?,
            ),
        })
    }
}

/// Reporter configuration.
#[derive(Clone, Debug)]
pub struct ReporterConfig {
    buffer_flush_interval: Duration,
    queue_size: usize,
    log_spans: bool,
    local_agent_host_port: String,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        ReporterConfig {
            buffer_flush_interval: DEFAULT_BUFFER_FLUSH_INTERVAL,
            queue_size: DEFAULT_QUEUE_SIZE,
            log_spans: false,
            local_agent_host_port: DEFAULT_AGENT_HOST_PORT.to_string(),
        }
    }
}

impl ReporterConfig {
    /// Longest a buffered span waits before a flush is forced.
    pub fn with_buffer_flush_interval(mut self, interval: Duration) -> Self {
        self.buffer_flush_interval = interval;
        self
    }

    /// Capacity of the reporter queue.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    /// Additionally log every reported span.
    pub fn with_log_spans(mut self, log_spans: bool) -> Self {
        self.log_spans = log_spans;
        self
    }

    /// `host:port` of the local agent.
    pub fn with_local_agent_host_port<T: Into<String>>(mut self, host_port: T) -> Self {
        self.local_agent_host_port = host_port.into();
        self
    }

    /// Construct the configured reporter pipeline.
    pub fn build(&self, service_name: &str, metrics: Arc<Metrics>) -> Result<Box<dyn Reporter>> {
        let transport = UdpTransport::new(
            self.local_agent_host_port.as_str(),
            Process::new(service_name),
            None,
        )?;
        let remote = RemoteReporter::builder(transport)
            .with_queue_size(self.queue_size)
            .with_buffer_flush_interval(self.buffer_flush_interval)
            .with_metrics(metrics)
            .build()?;
        if self.log_spans {
            Ok(Box::new(CompositeReporter::new(vec![
                Box::new(remote),
                Box::new(LoggingReporter),
            ])))
        } else {
            Ok(Box::new(remote))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SpanContext;
    use crate::Span;
    use crate::TraceId;

    #[test]
    fn const_sampler_from_config() {
        let metrics = Arc::new(Metrics::new());
        let sampler = SamplerConfig::default()
            .with_kind(SamplerKind::Const)
            .with_param(1.0)
            .build("svc", metrics)
            .unwrap();
        assert!(sampler.is_sampled(TraceId::new(0, 1), "op").is_sampled());
        sampler.close();
    }

    #[test]
    fn probabilistic_sampler_from_config() {
        let metrics = Arc::new(Metrics::new());
        let sampler = SamplerConfig::default()
            .with_kind(SamplerKind::Probabilistic)
            .with_param(0.0)
            .build("svc", metrics)
            .unwrap();
        assert!(!sampler.is_sampled(TraceId::new(0, 1), "op").is_sampled());
        sampler.close();
    }

    #[test]
    fn remote_sampler_from_config_starts_and_stops() {
        let metrics = Arc::new(Metrics::new());
        let sampler = SamplerConfig::default()
            .with_sampling_refresh_interval(Duration::from_secs(3600))
            .with_param(1.0)
            .build("svc", metrics)
            .unwrap();
        assert!(sampler.is_sampled(TraceId::new(0, 1), "op").is_sampled());
        sampler.close();
    }

    #[test]
    fn reporter_pipeline_from_config() {
        let metrics = Arc::new(Metrics::new());
        let reporter = ReporterConfig::default()
            .with_queue_size(10)
            .with_log_spans(true)
            .build("svc", Arc::clone(&metrics))
            .unwrap();
        reporter.report(Span::new(SpanContext::default(), "op"));
        reporter.close();
        assert_eq!(metrics.spans_submitted.get(), 1);
    }
}
