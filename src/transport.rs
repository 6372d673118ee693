//! Span transports.
//!
//! A transport owns the wire representation of spans. It is driven by a
//! single reporter worker thread, so implementations need no internal
//! synchronization.

pub(crate) mod udp;

use std::fmt;

use crate::error::Result;
use crate::span::Span;

pub use udp::{UdpTransport, DEFAULT_UDP_MAX_PACKET_SIZE};

/// A sink that batches spans and ships them to an agent.
pub trait Transport: Send + fmt::Debug {
    /// Add a span to the current batch. Returns how many spans were
    /// flushed as a side effect: a transport flushes early when the
    /// span would not fit into the current batch.
    fn append(&mut self, span: Span) -> Result<usize>;

    /// Ship whatever is buffered. Returns the number of spans sent.
    fn flush(&mut self) -> Result<usize>;

    /// Release the underlying connection. The caller flushes first.
    fn close(&mut self) -> Result<()>;
}
