//! The queue-and-worker reporter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::reporter::Reporter;
use crate::span::Span;
use crate::transport::Transport;

/// Default reporter queue capacity.
const DEFAULT_QUEUE_SIZE: usize = 100;
/// Default interval after which a non-empty batch is flushed anyway.
const DEFAULT_BUFFER_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Messages crossing from producers to the worker thread.
#[derive(Debug)]
enum ReporterMessage {
    Span(Span),
    Close(Sender<()>),
}

/// A reporter that decouples span completion from network emission.
///
/// `report` performs a non-blocking enqueue onto a bounded channel and
/// drops (with a counter) when the channel is full; a worker thread
/// drains the channel into the [`Transport`], flushing when the
/// transport's batch fills or when the flush interval elapses.
///
/// `close` drains whatever was enqueued before it, performs a final
/// flush and joins the worker.
#[derive(Debug)]
pub struct RemoteReporter {
    sender: Sender<ReporterMessage>,
    closed: AtomicBool,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<Metrics>,
}

impl RemoteReporter {
    /// Start configuring a reporter over `transport`.
    pub fn builder<T>(transport: T) -> RemoteReporterBuilder
    where
        T: Transport + 'static,
    {
        RemoteReporterBuilder::new(Box::new(transport))
    }
}

impl Reporter for RemoteReporter {
    fn report(&self, span: Span) {
        if self.closed.load(Ordering::Acquire) {
            self.metrics.spans_dropped.inc();
            return;
        }
        match self.sender.try_send(ReporterMessage::Span(span)) {
            Ok(()) => self.metrics.spans_submitted.inc(),
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.metrics.spans_dropped.inc();
                log::debug!("reporter queue full, dropping span");
            }
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let (ack_tx, ack_rx) = bounded(1);
        if self.sender.send(ReporterMessage::Close(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = worker {
            let _ = handle.join();
        }
    }
}

impl Drop for RemoteReporter {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builder for [`RemoteReporter`].
#[derive(Debug)]
pub struct RemoteReporterBuilder {
    transport: Box<dyn Transport>,
    queue_size: usize,
    buffer_flush_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl RemoteReporterBuilder {
    fn new(transport: Box<dyn Transport>) -> Self {
        RemoteReporterBuilder {
            transport,
            queue_size: DEFAULT_QUEUE_SIZE,
            buffer_flush_interval: DEFAULT_BUFFER_FLUSH_INTERVAL,
            metrics: None,
        }
    }

    /// Capacity of the span queue. Spans reported while the queue is
    /// full are dropped, not blocked on.
    pub fn with_queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size.max(1);
        self
    }

    /// Longest a buffered span waits before a flush is forced.
    pub fn with_buffer_flush_interval(mut self, interval: Duration) -> Self {
        self.buffer_flush_interval = interval;
        self
    }

    /// Counter block to report pipeline outcomes to.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the reporter and start its worker thread.
    pub fn build(self) -> Result<RemoteReporter> {
        let metrics = self.metrics.unwrap_or_default();
        let (sender, receiver) = bounded(self.queue_size);
        let worker = Worker {
            transport: self.transport,
            receiver,
            flush_interval: self.buffer_flush_interval,
            metrics: Arc::clone(&metrics),
            pending: 0,
        };
        let handle = thread::Builder::new()
            .name("jaeger-reporter".to_string())
            .spawn(move || worker.run())?;
        Ok(RemoteReporter {
            sender,
            closed: AtomicBool::new(false),
            worker: Mutex::new(Some(handle)),
            metrics,
        })
    }
}

struct Worker {
    transport: Box<dyn Transport>,
    receiver: Receiver<ReporterMessage>,
    flush_interval: Duration,
    metrics: Arc<Metrics>,
    /// Spans handed to the transport but not flushed yet.
    pending: usize,
}

impl Worker {
    fn run(mut self) {
        let mut next_flush = Instant::now() + self.flush_interval;
        loop {
            let timeout = next_flush.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(timeout) {
                Ok(ReporterMessage::Span(span)) => self.append(span),
                Ok(ReporterMessage::Close(ack)) => {
                    self.drain();
                    self.flush();
                    let _ = self.transport.close();
                    let _ = ack.send(());
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.pending > 0 {
                        self.flush();
                    }
                    next_flush = Instant::now() + self.flush_interval;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.flush();
                    let _ = self.transport.close();
                    return;
                }
            }
        }
    }

    fn drain(&mut self) {
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                ReporterMessage::Span(span) => self.append(span),
                ReporterMessage::Close(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    }

    fn append(&mut self, span: Span) {
        match self.transport.append(span) {
            Ok(flushed) => {
                self.pending = (self.pending + 1).saturating_sub(flushed);
                if flushed > 0 {
                    self.metrics.spans_flushed.add(flushed as u64);
                }
            }
            Err(err) => self.record_failure(err),
        }
    }

    fn flush(&mut self) {
        match self.transport.flush() {
            Ok(flushed) => {
                self.pending -= flushed.min(self.pending);
                if flushed > 0 {
                    self.metrics.spans_flushed.add(flushed as u64);
                }
            }
            Err(err) => self.record_failure(err),
        }
    }

    fn record_failure(&mut self, err: Error) {
        match err {
            Error::SpanTooLarge { .. } => {
                self.metrics.spans_too_large.inc();
                self.metrics.spans_dropped.inc();
                log::warn!("dropping span: {}", err);
            }
            Error::EmitBatch { dropped, .. } => {
                self.pending -= dropped.min(self.pending);
                self.metrics.spans_failed.add(dropped as u64);
                log::warn!("{}", err);
            }
            other => {
                // serialization failures lose the one span being appended
                self.metrics.spans_failed.inc();
                log::warn!("failed to buffer span: {}", other);
            }
        }
    }
}
