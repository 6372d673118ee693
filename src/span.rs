use std::time::{Duration, SystemTime};

use crate::tag::Tag;
use crate::trace_id::TraceId;

/// Bit set on [`SpanContext::flags`] when the trace is sampled.
pub const SAMPLED_FLAG: u8 = 0x01;
/// Bit set on [`SpanContext::flags`] when the trace is a forced debug trace.
pub const DEBUG_FLAG: u8 = 0x02;

/// The identifying portion of a span.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpanContext {
    /// Trace this span belongs to.
    pub trace_id: TraceId,
    /// Identifier of this span within the trace.
    pub span_id: u64,
    /// Identifier of the parent span, `0` for root spans.
    pub parent_span_id: u64,
    /// Sampling flags, see [`SAMPLED_FLAG`] and [`DEBUG_FLAG`].
    pub flags: u8,
}

impl SpanContext {
    /// Whether the sampled bit is set.
    pub fn is_sampled(&self) -> bool {
        self.flags & SAMPLED_FLAG != 0
    }
}

/// A timestamped set of fields recorded on a span.
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    /// When the event occurred.
    pub timestamp: SystemTime,
    /// Event payload.
    pub fields: Vec<Tag>,
}

/// The kind of causal relationship a [`SpanRef`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpanRefType {
    /// The referenced span is a parent awaiting this span's result.
    ChildOf,
    /// The referenced span does not depend on this span's result.
    FollowsFrom,
}

/// A causal reference to another span.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanRef {
    /// Relationship kind.
    pub ref_type: SpanRefType,
    /// Trace of the referenced span.
    pub trace_id: TraceId,
    /// Identifier of the referenced span.
    pub span_id: u64,
}

/// A finished unit of work, as consumed by reporters.
///
/// The reporter pipeline treats spans as opaque payloads; only the UDP
/// transport inspects them, to encode them and budget datagram space.
#[derive(Clone, Debug, PartialEq)]
pub struct Span {
    /// Identifying context.
    pub context: SpanContext,
    /// Name of the operation this span represents.
    pub operation_name: String,
    /// Wall-clock start time.
    pub start_time: SystemTime,
    /// Time between start and finish.
    pub duration: Duration,
    /// Annotations set on the span.
    pub tags: Vec<Tag>,
    /// Timestamped events recorded while the span was active.
    pub logs: Vec<LogRecord>,
    /// Causal references to other spans.
    pub references: Vec<SpanRef>,
}

impl Span {
    /// Create a span with the given context and operation name and
    /// empty annotations.
    pub fn new<T: Into<String>>(context: SpanContext, operation_name: T) -> Self {
        Span {
            context,
            operation_name: operation_name.into(),
            start_time: SystemTime::now(),
            duration: Duration::default(),
            tags: Vec::new(),
            logs: Vec::new(),
            references: Vec::new(),
        }
    }
}

/// The emitting process, sent once per batch as the batch header.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Process {
    /// Service name reported to the agent.
    pub service_name: String,
    /// Process-wide tags (hostname, client version, ...).
    pub tags: Vec<Tag>,
}

impl Process {
    /// Create a process block for `service_name` with no tags.
    pub fn new<T: Into<String>>(service_name: T) -> Self {
        Process {
            service_name: service_name.into(),
            tags: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampled_bit() {
        let mut context = SpanContext::default();
        assert!(!context.is_sampled());
        context.flags |= SAMPLED_FLAG;
        assert!(context.is_sampled());
        context.flags |= DEBUG_FLAG;
        assert!(context.is_sampled());
    }
}
