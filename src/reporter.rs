//! Span reporters.
//!
//! A reporter consumes finished spans. Most deployments use a
//! [`RemoteReporter`] shipping to an agent; the others exist for
//! composition and tests.

pub(crate) mod remote;

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::span::Span;

pub use remote::{RemoteReporter, RemoteReporterBuilder};

/// A sink for finished spans.
///
/// `report` sits on the span-completion hot path and must not block;
/// implementations that do I/O hand the span off to a worker instead.
pub trait Reporter: Send + Sync + fmt::Debug {
    /// Consume a finished span.
    fn report(&self, span: Span);

    /// Flush and release background resources. Idempotent; the default
    /// does nothing.
    fn close(&self) {}
}

/// A reporter that discards every span.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _span: Span) {}
}

/// A reporter that logs spans at `info` level and drops them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingReporter;

impl Reporter for LoggingReporter {
    fn report(&self, span: Span) {
        log::info!(
            "reporting span {} of trace {}",
            span.operation_name,
            span.context.trace_id
        );
    }
}

/// A reporter that retains spans in memory, for tests and tooling.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    spans: Mutex<Vec<Span>>,
}

impl InMemoryReporter {
    /// Create an empty reporter.
    pub fn new() -> Self {
        InMemoryReporter::default()
    }

    /// A copy of the spans reported so far.
    pub fn spans(&self) -> Vec<Span> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of spans reported so far.
    pub fn len(&self) -> usize {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no spans have been reported.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all retained spans.
    pub fn reset(&self) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Reporter for InMemoryReporter {
    fn report(&self, span: Span) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}

/// A reporter that fans every span out to an ordered list of delegates.
#[derive(Debug)]
pub struct CompositeReporter {
    reporters: Vec<Box<dyn Reporter>>,
}

impl CompositeReporter {
    /// Create a reporter delegating to `reporters` in order.
    pub fn new(reporters: Vec<Box<dyn Reporter>>) -> Self {
        CompositeReporter { reporters }
    }
}

impl Reporter for CompositeReporter {
    fn report(&self, span: Span) {
        for reporter in &self.reporters {
            reporter.report(span.clone());
        }
    }

    fn close(&self) {
        for reporter in &self.reporters {
            reporter.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SpanContext;
    use std::sync::Arc;

    fn test_span() -> Span {
        Span::new(SpanContext::default(), "op")
    }

    #[test]
    fn null_reporter_accepts_everything() {
        let reporter = NullReporter;
        for _ in 0..100 {
            reporter.report(test_span());
        }
        reporter.close();
    }

    #[test]
    fn logging_reporter_accepts_everything() {
        let reporter = LoggingReporter;
        for _ in 0..100 {
            reporter.report(test_span());
        }
        reporter.close();
    }

    #[test]
    fn in_memory_reporter_retains_and_resets() {
        let reporter = InMemoryReporter::new();
        for _ in 0..100 {
            reporter.report(test_span());
        }
        assert_eq!(reporter.len(), 100);
        assert_eq!(reporter.spans().len(), 100);
        reporter.reset();
        assert!(reporter.is_empty());
        reporter.close();
    }

    #[test]
    fn composite_reporter_fans_out_in_order() {
        let first = Arc::new(InMemoryReporter::new());
        let second = Arc::new(InMemoryReporter::new());

        #[derive(Debug)]
        struct Shared(Arc<InMemoryReporter>);
        impl Reporter for Shared {
            fn report(&self, span: Span) {
                self.0.report(span);
            }
        }

        let reporter = CompositeReporter::new(vec![
            Box::new(Shared(Arc::clone(&first))),
            Box::new(Shared(Arc::clone(&second))),
        ]);
        reporter.report(test_span());
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
