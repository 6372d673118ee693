//! Remotely controlled sampling.
//!
//! A [`RemoteSampler`] wraps one of the leaf samplers and swaps it out
//! whenever the sampling manager publishes a new strategy for the
//! service. The poller is a plain thread; it is signalled through a
//! channel on close and joined deterministically.

pub(crate) mod strategies;

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::Result;
use crate::metrics::Metrics;
use crate::sampler::{
    PerOperationSampler, ProbabilisticSampler, RateLimitingSampler, Sampler, SamplingStatus,
};
use crate::trace_id::TraceId;
use strategies::SamplingStrategyResponse;

/// Default sampling manager endpoint.
const DEFAULT_SAMPLING_SERVER_URL: &str = "http://localhost:5778/sampling";
/// Default interval between strategy polls.
const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);
/// Default bound on the per-operation sampler map.
const DEFAULT_MAX_OPERATIONS: usize = 2000;
/// Sampling rate used until the first strategy arrives.
const DEFAULT_INITIAL_SAMPLING_RATE: f64 = 0.001;

/// Timeout for a single strategy request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// The sampler currently steering decisions, swapped wholesale when a
/// strategy of a different kind arrives.
#[derive(Debug)]
enum InnerSampler {
    Probabilistic(ProbabilisticSampler),
    RateLimiting(RateLimitingSampler),
    PerOperation(PerOperationSampler),
}

impl InnerSampler {
    fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        match self {
            InnerSampler::Probabilistic(sampler) => sampler.is_sampled(trace_id, operation_name),
            InnerSampler::RateLimiting(sampler) => sampler.is_sampled(trace_id, operation_name),
            InnerSampler::PerOperation(sampler) => sampler.is_sampled(trace_id, operation_name),
        }
    }
}

#[derive(Debug)]
struct SharedState {
    inner: RwLock<InnerSampler>,
    max_operations: usize,
    metrics: Arc<Metrics>,
}

impl SharedState {
    /// Apply a strategy response. The payloads are mutually exclusive;
    /// per-operation wins if a response carries several, matching the
    /// precedence the response documents.
    fn apply(&self, response: SamplingStrategyResponse) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(operation_sampling) = response.operation_sampling {
            if let InnerSampler::PerOperation(sampler) = &*inner {
                sampler.update(&operation_sampling);
            } else {
                *inner = InnerSampler::PerOperation(PerOperationSampler::new(
                    &operation_sampling,
                    self.max_operations,
                ));
            }
        } else if let Some(rate_limiting) = response.rate_limiting_sampling {
            let unchanged = matches!(
                &*inner,
                InnerSampler::RateLimiting(sampler)
                    if sampler.max_traces_per_second() == rate_limiting.max_traces_per_second
            );
            if !unchanged {
                *inner = InnerSampler::RateLimiting(RateLimitingSampler::new(
                    rate_limiting.max_traces_per_second,
                ));
            }
        } else if let Some(probabilistic) = response.probabilistic_sampling {
            let unchanged = matches!(
                &*inner,
                InnerSampler::Probabilistic(sampler)
                    if sampler.sampling_rate() == probabilistic.sampling_rate
            );
            if !unchanged {
                *inner =
                    InnerSampler::Probabilistic(ProbabilisticSampler::new(probabilistic.sampling_rate));
            }
        } else {
            log::warn!("sampling strategy response carried no strategy, keeping current sampler");
            self.metrics.sampler_update_failures.inc();
            return;
        }
        self.metrics.sampler_updates.inc();
    }
}

/// A sampler that periodically fetches its strategy from a sampling
/// manager.
///
/// Until the first successful poll it behaves as a probabilistic
/// sampler at the configured initial rate. Poll failures leave the
/// current strategy untouched.
#[derive(Debug)]
pub struct RemoteSampler {
    shared: Arc<SharedState>,
    shutdown: Sender<()>,
    poller: Mutex<Option<thread::JoinHandle<()>>>,
}

impl RemoteSampler {
    /// Start configuring a remote sampler for `service_name`.
    pub fn builder<T: Into<String>>(service_name: T) -> RemoteSamplerBuilder {
        RemoteSamplerBuilder::new(service_name)
    }

    fn poll_loop(
        shared: Arc<SharedState>,
        endpoint: String,
        polling_interval: Duration,
        shutdown: Receiver<()>,
    ) {
        let client = match reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                log::warn!("sampling strategy client unavailable: {}", err);
                return;
            }
        };
        loop {
            match shutdown.recv_timeout(polling_interval) {
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    Self::poll_once(&client, &endpoint, &shared)
                }
                _ => return,
            }
        }
    }

    fn poll_once(client: &reqwest::blocking::Client, endpoint: &str, shared: &SharedState) {
        shared.metrics.sampler_queries.inc();
        let body = client
            .get(endpoint)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text());
        let body = match body {
            Ok(body) => body,
            Err(err) => {
                shared.metrics.sampler_query_failures.inc();
                log::warn!("sampling strategy request failed: {}", err);
                return;
            }
        };
        match serde_json::from_str::<SamplingStrategyResponse>(&body) {
            Ok(response) => shared.apply(response),
            Err(err) => {
                shared.metrics.sampler_update_failures.inc();
                log::warn!("malformed sampling strategy response: {}", err);
            }
        }
    }
}

impl Sampler for RemoteSampler {
    fn is_sampled(&self, trace_id: TraceId, operation_name: &str) -> SamplingStatus {
        self.shared
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_sampled(trace_id, operation_name)
    }

    fn close(&self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = poller {
            let _ = self.shutdown.try_send(());
            let _ = handle.join();
        }
    }
}

impl Drop for RemoteSampler {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`RemoteSampler`].
#[derive(Debug)]
pub struct RemoteSamplerBuilder {
    service_name: String,
    sampling_server_url: String,
    polling_interval: Duration,
    initial_sampling_rate: f64,
    max_operations: usize,
    metrics: Option<Arc<Metrics>>,
}

impl RemoteSamplerBuilder {
    fn new<T: Into<String>>(service_name: T) -> Self {
        RemoteSamplerBuilder {
            service_name: service_name.into(),
            sampling_server_url: DEFAULT_SAMPLING_SERVER_URL.to_string(),
            polling_interval: DEFAULT_POLLING_INTERVAL,
            initial_sampling_rate: DEFAULT_INITIAL_SAMPLING_RATE,
            max_operations: DEFAULT_MAX_OPERATIONS,
            metrics: None,
        }
    }

    /// The sampling manager to poll. Default
    /// `http://localhost:5778/sampling`.
    pub fn with_sampling_server_url<T: Into<String>>(mut self, url: T) -> Self {
        self.sampling_server_url = url.into();
        self
    }

    /// How often to poll. Default one minute; shorter intervals add
    /// load on the manager.
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Probabilistic rate used until the first strategy arrives.
    pub fn with_initial_sampling_rate(mut self, rate: f64) -> Self {
        self.initial_sampling_rate = rate;
        self
    }

    /// Bound on the per-operation sampler map.
    pub fn with_max_operations(mut self, max_operations: usize) -> Self {
        self.max_operations = max_operations;
        self
    }

    /// Counter block to report polls and updates to.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the sampler and start its poller thread.
    pub fn build(self) -> Result<RemoteSampler> {
        let endpoint = service_endpoint(&self.sampling_server_url, &self.service_name)?;
        let shared = Arc::new(SharedState {
            inner: RwLock::new(InnerSampler::Probabilistic(ProbabilisticSampler::new(
                self.initial_sampling_rate,
            ))),
            max_operations: self.max_operations,
            metrics: self.metrics.unwrap_or_default(),
        });
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let poller_shared = Arc::clone(&shared);
        let polling_interval = self.polling_interval;
        let handle = thread::Builder::new()
            .name("jaeger-sampler-poll".to_string())
            .spawn(move || {
                RemoteSampler::poll_loop(poller_shared, endpoint, polling_interval, shutdown_rx)
            })?;
        Ok(RemoteSampler {
            shared,
            shutdown: shutdown_tx,
            poller: Mutex::new(Some(handle)),
        })
    }
}

/// Attach the service name to the configured manager URL.
fn service_endpoint(sampling_server_url: &str, service_name: &str) -> Result<String> {
    let mut url = url::Url::parse(sampling_server_url)?;
    url.query_pairs_mut().append_pair("service", service_name);
    Ok(url.into())
}
