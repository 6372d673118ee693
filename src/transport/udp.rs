//! UDP agent transport with thrift-compact framing.

use std::fmt;
use std::net::{ToSocketAddrs, UdpSocket};

use crate::error::{Error, Result};
use crate::span::{Process, Span};
use crate::thrift::{agent::AgentClient, compact_encoded_len, jaeger, TBufferChannel};
use crate::transport::Transport;

/// Largest datagram the agent accepts.
pub const DEFAULT_UDP_MAX_PACKET_SIZE: usize = 65_000;

/// Bytes of `emitBatch` envelope around the process and span payload:
/// message header, argument struct, batch struct and the two list
/// headers, with slack for the varint list sizes.
const EMIT_BATCH_OVERHEAD: usize = 30;

/// A [`Transport`] that emits batches as single UDP datagrams to a
/// Jaeger agent.
///
/// Spans are encoded eagerly so the running batch size is known
/// exactly; a span that would push the datagram over the packet budget
/// triggers a flush of the accumulated batch first.
pub struct UdpTransport {
    conn: UdpSocket,
    buffer: TBufferChannel,
    client: AgentClient<TBufferChannel>,
    process: jaeger::Process,
    max_packet_size: usize,
    max_span_bytes: usize,
    span_buffer: Vec<jaeger::Span>,
    byte_buffer_size: usize,
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpTransport")
            .field("conn", &self.conn)
            .field("max_packet_size", &self.max_packet_size)
            .field("buffered_spans", &self.span_buffer.len())
            .finish()
    }
}

impl UdpTransport {
    /// Create a transport connected to `agent_host_port`, emitting
    /// batches on behalf of `process`. `max_packet_size` defaults to
    /// [`DEFAULT_UDP_MAX_PACKET_SIZE`].
    pub fn new<T: ToSocketAddrs>(
        agent_host_port: T,
        process: Process,
        max_packet_size: Option<usize>,
    ) -> Result<Self> {
        let max_packet_size = max_packet_size.unwrap_or(DEFAULT_UDP_MAX_PACKET_SIZE);
        let conn = UdpSocket::bind("0.0.0.0:0")?;
        conn.connect(agent_host_port)?;

        let process = jaeger::Process::from(&process);
        let process_byte_size = compact_encoded_len(|p| process.write_to_out_protocol(p))?;
        let max_span_bytes = max_packet_size
            .saturating_sub(process_byte_size)
            .saturating_sub(EMIT_BATCH_OVERHEAD);

        let buffer = TBufferChannel::with_capacity(max_packet_size);
        let client = AgentClient::new(buffer.clone());

        Ok(UdpTransport {
            conn,
            buffer,
            client,
            process,
            max_packet_size,
            max_span_bytes,
            span_buffer: Vec::new(),
            byte_buffer_size: 0,
        })
    }

    fn send_current_batch(&mut self) -> Result<usize> {
        let spans = std::mem::take(&mut self.span_buffer);
        let flushed = spans.len();
        self.byte_buffer_size = 0;

        let batch = jaeger::Batch {
            process: self.process.clone(),
            spans,
        };
        if let Err(err) = self.client.emit_batch(&batch) {
            self.buffer.take_bytes();
            return Err(Error::EmitBatch {
                dropped: flushed,
                message: err.to_string(),
            });
        }
        let payload = self.buffer.take_bytes();
        if let Err(err) = self.conn.send(&payload) {
            return Err(Error::EmitBatch {
                dropped: flushed,
                message: err.to_string(),
            });
        }
        Ok(flushed)
    }
}

impl Transport for UdpTransport {
    fn append(&mut self, span: Span) -> Result<usize> {
        let span = jaeger::Span::from(&span);
        let span_size = compact_encoded_len(|p| span.write_to_out_protocol(p))?;
        if span_size > self.max_span_bytes {
            return Err(Error::SpanTooLarge {
                size: span_size,
                max: self.max_span_bytes,
            });
        }

        if self.byte_buffer_size + span_size <= self.max_span_bytes {
            self.span_buffer.push(span);
            self.byte_buffer_size += span_size;
            if self.byte_buffer_size < self.max_span_bytes {
                return Ok(0);
            }
            // the batch is exactly full
            return self.flush();
        }

        // the new span does not fit, ship the current batch first
        let flushed = self.send_current_batch()?;
        self.byte_buffer_size = span_size;
        self.span_buffer.push(span);
        Ok(flushed)
    }

    fn flush(&mut self) -> Result<usize> {
        if self.span_buffer.is_empty() {
            return Ok(0);
        }
        self.send_current_batch()
    }

    fn close(&mut self) -> Result<()> {
        // the socket closes on drop; nothing to tear down beyond that
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::SpanContext;
    use crate::tag::Tag;
    use std::time::Duration;

    fn listening_socket() -> (UdpSocket, std::net::SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let address = socket.local_addr().unwrap();
        (socket, address)
    }

    fn test_span(operation_name: &str) -> Span {
        Span::new(SpanContext::default(), operation_name)
    }

    #[test]
    fn flush_emits_one_compact_datagram() {
        let (receiver, address) = listening_socket();
        let mut transport =
            UdpTransport::new(address, Process::new("test-service"), None).unwrap();

        assert_eq!(transport.append(test_span("op")).unwrap(), 0);
        assert_eq!(transport.flush().unwrap(), 1);

        let mut datagram = [0u8; DEFAULT_UDP_MAX_PACKET_SIZE];
        let received = receiver.recv(&mut datagram).unwrap();
        assert!(received > 0);
        assert!(received <= DEFAULT_UDP_MAX_PACKET_SIZE);
        // compact protocol id of the emitBatch message
        assert_eq!(datagram[0], 0x82);
    }

    #[test]
    fn flush_on_empty_buffer_sends_nothing() {
        let (receiver, address) = listening_socket();
        let mut transport =
            UdpTransport::new(address, Process::new("test-service"), None).unwrap();
        assert_eq!(transport.flush().unwrap(), 0);
        let mut datagram = [0u8; 64];
        receiver
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        assert!(receiver.recv(&mut datagram).is_err());
    }

    #[test]
    fn append_flushes_when_the_batch_would_overflow() {
        let (receiver, address) = listening_socket();
        let mut transport =
            UdpTransport::new(address, Process::new("test-service"), Some(600)).unwrap();

        let mut appended = 0usize;
        let mut flushed = 0usize;
        while flushed == 0 {
            flushed = transport.append(test_span("padded-operation-name")).unwrap();
            appended += 1;
            assert!(appended < 100, "batch never filled");
        }
        assert!(flushed > 0 && flushed <= appended);

        let mut datagram = [0u8; 4096];
        let received = receiver.recv(&mut datagram).unwrap();
        assert!(received <= 600, "datagram of {} bytes over budget", received);
    }

    #[test]
    fn oversized_span_is_rejected_not_buffered() {
        let (_receiver, address) = listening_socket();
        let mut transport =
            UdpTransport::new(address, Process::new("test-service"), Some(400)).unwrap();

        let mut span = test_span("op");
        span.tags.push(Tag::new("blob", "x".repeat(1000)));
        match transport.append(span) {
            Err(Error::SpanTooLarge { size, max }) => {
                assert!(size > max);
            }
            other => panic!("expected SpanTooLarge, got {:?}", other.map(|_| ())),
        }
        // the transport stays usable
        assert_eq!(transport.append(test_span("op")).unwrap(), 0);
        assert_eq!(transport.flush().unwrap(), 1);
    }
}
