//! # Jaeger Client Core
//!
//! The sampling and reporting core of a [Jaeger]-compatible tracing
//! client: the decision functions consulted when a root span is
//! created, and the pipeline that ships finished spans to a local agent
//! over UDP with thrift-compact framing.
//!
//! A tracer facade wires these together; this crate deliberately stops
//! at the two seams it owns:
//!
//! * [`sampler::Sampler`] — `const`, probabilistic, rate-limiting,
//!   guaranteed-throughput, adaptive per-operation, and the remotely
//!   controlled sampler that polls a strategy manager.
//! * [`reporter::Reporter`] — a bounded-queue remote reporter with a
//!   background flush worker, plus null/logging/in-memory/composite
//!   utility reporters.
//!
//! [Jaeger]: https://www.jaegertracing.io/
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jaeger_client_core::config::{ReporterConfig, SamplerConfig, SamplerKind};
//! use jaeger_client_core::Metrics;
//!
//! fn main() -> jaeger_client_core::Result<()> {
//!     let metrics = Arc::new(Metrics::new());
//!     let sampler = SamplerConfig::default()
//!         .with_kind(SamplerKind::Remote)
//!         .with_param(0.01)
//!         .build("my-service", Arc::clone(&metrics))?;
//!     let reporter = ReporterConfig::default()
//!         .with_local_agent_host_port("127.0.0.1:6831")
//!         .build("my-service", metrics)?;
//!     // hand sampler and reporter to the tracer...
//!     # let _ = (sampler, reporter);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, unreachable_pub, missing_debug_implementations)]

pub mod config;
mod error;
mod metrics;
pub mod reporter;
pub mod sampler;
mod span;
mod tag;
#[allow(unreachable_pub)]
mod thrift;
mod trace_id;
pub mod transport;

pub use error::{Error, Result};
pub use metrics::{Counter, Metrics};
pub use span::{
    LogRecord, Process, Span, SpanContext, SpanRef, SpanRefType, DEBUG_FLAG, SAMPLED_FLAG,
};
pub use tag::{Tag, TagValue};
pub use trace_id::TraceId;
