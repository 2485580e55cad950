//! Observability and Metrics
//!
//! Advisory hooks notified on codec, registry and dispatch events, plus an
//! atomic-counter [`Metrics`] collector. Observers never affect control flow.

use crate::error::ProtocolError;
use crate::protocol::message::MessageTypeDescriptor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Observability hook for the message core.
///
/// Every method has an empty default so implementors pick what they need.
pub trait ProtocolObserver: Send + Sync {
    /// A codec, registry or dispatch error occurred
    fn on_error(&self, _error: &ProtocolError) {}

    /// An inbound envelope was decoded from `bytes` bytes
    fn on_decoded(&self, _descriptor: &MessageTypeDescriptor, _bytes: usize) {}

    /// An outbound envelope was encoded into `bytes` bytes
    fn on_encoded(&self, _descriptor: &MessageTypeDescriptor, _bytes: usize) {}

    /// A handler returned successfully
    fn on_dispatched(&self, _descriptor: &MessageTypeDescriptor, _elapsed: Duration) {}

    /// Pending envelopes were dropped when a queue closed
    fn on_discarded(&self, _count: usize) {}
}

/// Observer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProtocolObserver for NoopObserver {}

/// Observer that writes every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProtocolObserver for TracingObserver {
    fn on_error(&self, error: &ProtocolError) {
        warn!(kind = error.kind_name(), error = %error, "Message core error");
    }

    fn on_decoded(&self, descriptor: &MessageTypeDescriptor, bytes: usize) {
        debug!(type_id = descriptor.id, category = %descriptor.category, bytes, "Envelope decoded");
    }

    fn on_encoded(&self, descriptor: &MessageTypeDescriptor, bytes: usize) {
        debug!(type_id = descriptor.id, category = %descriptor.category, bytes, "Envelope encoded");
    }

    fn on_dispatched(&self, descriptor: &MessageTypeDescriptor, elapsed: Duration) {
        debug!(
            type_id = descriptor.id,
            handler = %descriptor.handler_kind,
            duration_us = elapsed.as_micros() as u64,
            "Envelope dispatched"
        );
    }

    fn on_discarded(&self, count: usize) {
        warn!(count, "Undelivered envelopes discarded");
    }
}

/// Fan-out to several observers in registration order
#[derive(Default, Clone)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn ProtocolObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl ProtocolObserver for ObserverSet {
    fn on_error(&self, error: &ProtocolError) {
        self.observers.iter().for_each(|o| o.on_error(error));
    }

    fn on_decoded(&self, descriptor: &MessageTypeDescriptor, bytes: usize) {
        self.observers.iter().for_each(|o| o.on_decoded(descriptor, bytes));
    }

    fn on_encoded(&self, descriptor: &MessageTypeDescriptor, bytes: usize) {
        self.observers.iter().for_each(|o| o.on_encoded(descriptor, bytes));
    }

    fn on_dispatched(&self, descriptor: &MessageTypeDescriptor, elapsed: Duration) {
        self.observers.iter().for_each(|o| o.on_dispatched(descriptor, elapsed));
    }

    fn on_discarded(&self, count: usize) {
        self.observers.iter().for_each(|o| o.on_discarded(count));
    }
}

/// Metrics collector for message core operations
#[derive(Debug)]
pub struct Metrics {
    /// Envelopes decoded
    pub decoded: AtomicU64,
    /// Bytes decoded
    pub bytes_decoded: AtomicU64,
    /// Envelopes encoded
    pub encoded: AtomicU64,
    /// Bytes encoded
    pub bytes_encoded: AtomicU64,
    /// Successful handler invocations
    pub dispatched: AtomicU64,
    /// Envelopes discarded at queue close
    pub discarded: AtomicU64,
    pub encoding_failures: AtomicU64,
    pub decoding_failures: AtomicU64,
    pub duplicate_type_identifiers: AtomicU64,
    pub unknown_type_identifiers: AtomicU64,
    pub handlers_not_found: AtomicU64,
    /// Errors returned by handlers
    pub handler_errors: AtomicU64,
    /// Anything else (closed queue, configuration, I/O)
    pub other_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            decoded: AtomicU64::new(0),
            bytes_decoded: AtomicU64::new(0),
            encoded: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            dispatched: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            encoding_failures: AtomicU64::new(0),
            decoding_failures: AtomicU64::new(0),
            duplicate_type_identifiers: AtomicU64::new(0),
            unknown_type_identifiers: AtomicU64::new(0),
            handlers_not_found: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            other_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            decoded: self.decoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            encoded: self.encoded.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            encoding_failures: self.encoding_failures.load(Ordering::Relaxed),
            decoding_failures: self.decoding_failures.load(Ordering::Relaxed),
            duplicate_type_identifiers: self.duplicate_type_identifiers.load(Ordering::Relaxed),
            unknown_type_identifiers: self.unknown_type_identifiers.load(Ordering::Relaxed),
            handlers_not_found: self.handlers_not_found.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            other_errors: self.other_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            decoded = snapshot.decoded,
            bytes_decoded = snapshot.bytes_decoded,
            encoded = snapshot.encoded,
            bytes_encoded = snapshot.bytes_encoded,
            dispatched = snapshot.dispatched,
            discarded = snapshot.discarded,
            encoding_failures = snapshot.encoding_failures,
            decoding_failures = snapshot.decoding_failures,
            duplicate_type_identifiers = snapshot.duplicate_type_identifiers,
            unknown_type_identifiers = snapshot.unknown_type_identifiers,
            handlers_not_found = snapshot.handlers_not_found,
            handler_errors = snapshot.handler_errors,
            other_errors = snapshot.other_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Message core metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolObserver for Metrics {
    fn on_error(&self, error: &ProtocolError) {
        let counter = match error {
            ProtocolError::EncodingFailure(_) => &self.encoding_failures,
            ProtocolError::DecodingFailure(_) => &self.decoding_failures,
            ProtocolError::DuplicateTypeIdentifier(_) => &self.duplicate_type_identifiers,
            ProtocolError::UnknownTypeIdentifier(_) => &self.unknown_type_identifiers,
            ProtocolError::HandlerNotFound(_) => &self.handlers_not_found,
            ProtocolError::Handler(_) => &self.handler_errors,
            _ => &self.other_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn on_decoded(&self, _descriptor: &MessageTypeDescriptor, bytes: usize) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn on_encoded(&self, _descriptor: &MessageTypeDescriptor, bytes: usize) {
        self.encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn on_dispatched(&self, _descriptor: &MessageTypeDescriptor, _elapsed: Duration) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    fn on_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub decoded: u64,
    pub bytes_decoded: u64,
    pub encoded: u64,
    pub bytes_encoded: u64,
    pub dispatched: u64,
    pub discarded: u64,
    pub encoding_failures: u64,
    pub decoding_failures: u64,
    pub duplicate_type_identifiers: u64,
    pub unknown_type_identifiers: u64,
    pub handlers_not_found: u64,
    pub handler_errors: u64,
    pub other_errors: u64,
    pub uptime_seconds: u64,
}
