use std::io;

/// Convenience alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by background operations.
///
/// The hot paths (`Sampler::is_sampled`, `Reporter::report`) never
/// return these; they reach callers only from constructors and from the
/// [`Transport`](crate::transport::Transport) interface, and otherwise
/// end up in logs and [`Metrics`](crate::Metrics).
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Thrift serialization failed.
    #[error("thrift serialization failed: {0}")]
    Thrift(#[from] thrift::Error),

    /// A single span is larger than the maximum datagram payload and
    /// can never be emitted.
    #[error("span of {size} bytes exceeds maximum allowed {max} bytes")]
    SpanTooLarge {
        /// Serialized size of the offending span.
        size: usize,
        /// Maximum space a span may occupy in a datagram.
        max: usize,
    },

    /// A batch could not be handed to the agent; the spans it contained
    /// are lost.
    #[error("failed to emit a batch of {dropped} spans: {message}")]
    EmitBatch {
        /// Number of spans dropped with the batch.
        dropped: usize,
        /// Cause of the failure.
        message: String,
    },

    /// The sampling strategy endpoint could not be queried.
    #[error("sampling strategy request failed: {0}")]
    StrategyRequest(#[from] reqwest::Error),

    /// The sampling strategy response was not valid.
    #[error("malformed sampling strategy response: {0}")]
    StrategyResponse(#[from] serde_json::Error),

    /// The configured sampling server URL could not be parsed.
    #[error("invalid sampling server url: {0}")]
    SamplingServerUrl(#[from] url::ParseError),

    /// Socket or thread-spawn failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}
