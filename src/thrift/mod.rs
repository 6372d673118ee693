//! Write-side thrift plumbing for the agent protocol.
//!
//! Datagrams are assembled in memory: the compact protocol writes into
//! a shared growable buffer, and the transport drains that buffer into
//! the socket. Only the fields the client emits are modeled; the read
//! side of the protocol is not needed.

pub(crate) mod agent;
pub(crate) mod jaeger;

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use thrift::protocol::{TCompactOutputProtocol, TOutputProtocol};

/// A thrift write transport backed by a growable in-memory buffer.
///
/// Clones share the same buffer, so one handle can be given to the
/// output protocol while another drains the accumulated bytes.
#[derive(Clone, Debug, Default)]
pub(crate) struct TBufferChannel {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl TBufferChannel {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        TBufferChannel {
            inner: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    /// Remove and return everything written so far.
    pub(crate) fn take_bytes(&self) -> Vec<u8> {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *buffer)
    }

    /// Number of bytes currently buffered.
    pub(crate) fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl io::Write for TBufferChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialized size of a value, measured by encoding it into a scratch
/// buffer with the compact protocol.
pub(crate) fn compact_encoded_len<F>(write: F) -> thrift::Result<usize>
where
    F: FnOnce(&mut dyn TOutputProtocol) -> thrift::Result<()>,
{
    let channel = TBufferChannel::with_capacity(128);
    let mut protocol = TCompactOutputProtocol::new(channel.clone());
    write(&mut protocol)?;
    protocol.flush()?;
    Ok(channel.len())
}
