//! # Endpoint
//!
//! One logical connection: the inbound path decodes bytes and enqueues the
//! envelope, the drain loop dequeues and dispatches, and the outbound path
//! encodes envelopes for the transport.
//!
//! Each endpoint owns its codec and listener queue. The registry and the
//! dispatcher (with its handler instances) are shared by every endpoint.
//!
//! ```rust
//! use message_protocol::config::ProtocolConfig;
//! use message_protocol::core::payload::{Payload, PayloadKind};
//! use message_protocol::error::Result;
//! use message_protocol::protocol::dispatcher::Dispatcher;
//! use message_protocol::protocol::endpoint::Endpoint;
//! use message_protocol::protocol::message::*;
//! use message_protocol::protocol::registry::MessageRegistry;
//! use std::sync::Arc;
//!
//! const PING: MessageTypeDescriptor =
//!     MessageTypeDescriptor::new(1, MessageCategory::Basic, PayloadKind::Empty, HandlerKind::Heartbeat);
//!
//! let registry = Arc::new(MessageRegistry::with_descriptors([PING]).unwrap());
//! let mut dispatcher: Dispatcher<()> = Dispatcher::new(registry.clone());
//! dispatcher
//!     .register(HandlerKind::Heartbeat, |_: &(), _: Envelope| -> Result<()> { Ok(()) })
//!     .unwrap();
//!
//! let endpoint = Endpoint::new("peer-1", Arc::new(dispatcher), &ProtocolConfig::default());
//! let bytes = endpoint.send(&registry.create_envelope(1, Payload::Empty).unwrap()).unwrap();
//! endpoint.receive(&bytes).unwrap();
//! let report = endpoint.drain_pending(&()).unwrap();
//! assert_eq!(report.dispatched, 1);
//! ```

use crate::config::ProtocolConfig;
use crate::core::codec::{Codec, EnvelopeCodec};
use crate::core::payload::Payload;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{Envelope, MessageType};
use crate::protocol::queue::{ListenerQueue, QueueState};
use crate::protocol::registry::MessageRegistry;
use crate::utils::metrics::{ProtocolObserver, TracingObserver};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Counts produced by a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Envelopes whose handler returned `Ok`
    pub dispatched: usize,
    /// Envelopes that failed to dispatch or whose handler returned an error
    pub failed: usize,
    /// Envelopes dropped by a forced close
    pub discarded: usize,
}

pub struct Endpoint<C: 'static> {
    name: String,
    codec: EnvelopeCodec,
    dispatcher: Arc<Dispatcher<C>>,
    queue: Arc<ListenerQueue>,
    observer: Arc<dyn ProtocolObserver>,
    drain_timeout: Duration,
    max_frame_size: usize,
}

impl<C: 'static> Endpoint<C> {
    /// Create an endpoint with a fresh codec and queue.
    ///
    /// The registry is taken from the dispatcher so both always agree.
    pub fn new(name: impl Into<String>, dispatcher: Arc<Dispatcher<C>>, config: &ProtocolConfig) -> Self {
        let name = name.into();
        let codec = EnvelopeCodec::new(
            dispatcher.registry().clone(),
            Codec::from_config(&config.codec),
        );
        let queue = Arc::new(ListenerQueue::with_config(name.clone(), &config.queue));
        Self {
            name,
            codec,
            dispatcher,
            queue,
            observer: Arc::new(TracingObserver),
            drain_timeout: config.queue.drain_timeout,
            max_frame_size: config.codec.max_frame_size(),
        }
    }

    /// Replace the default tracing observer
    pub fn with_observer(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        self.codec.registry()
    }

    pub fn queue(&self) -> &Arc<ListenerQueue> {
        &self.queue
    }

    /// Largest frame a stream transport should accept for this endpoint
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Build an outbound envelope for a registered id
    pub fn envelope(&self, id: u32, payload: Payload) -> Result<Envelope> {
        self.registry()
            .create_envelope(id, payload)
            .inspect_err(|e| self.observer.on_error(e))
    }

    /// Build an outbound envelope from a typed message handle
    pub fn envelope_for<T: MessageType + ?Sized>(&self, message_type: &T, payload: Payload) -> Result<Envelope> {
        self.registry()
            .create_envelope_for(message_type, payload)
            .inspect_err(|e| self.observer.on_error(e))
    }

    /// Inbound path: decode `bytes` and enqueue the envelope.
    ///
    /// Decode errors are reported to the observer and returned; the queue is
    /// left untouched so later messages still flow.
    pub fn receive(&self, bytes: &[u8]) -> Result<()> {
        let envelope = match self.codec.decode(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(endpoint = %self.name, error = %e, "Dropping undecodable message");
                self.observer.on_error(&e);
                return Err(e);
            }
        };
        self.observer.on_decoded(envelope.descriptor(), bytes.len());
        self.queue.enqueue(envelope)
    }

    /// Outbound path: encode an envelope for the transport.
    ///
    /// Encoding failures are surfaced to the caller.
    pub fn send(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        match self.codec.encode(envelope) {
            Ok(bytes) => {
                self.observer.on_encoded(envelope.descriptor(), bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                self.observer.on_error(&e);
                Err(e)
            }
        }
    }

    /// Mark the connection as gone. Pending envelopes are still drained.
    pub fn disconnect(&self) -> bool {
        self.queue.disconnect()
    }

    fn dispatch_one(&self, ctx: &C, envelope: Envelope, report: &mut DrainReport) {
        let descriptor = *envelope.descriptor();
        let started = Instant::now();
        match self.dispatcher.dispatch(ctx, envelope) {
            Ok(()) => {
                report.dispatched += 1;
                self.observer.on_dispatched(&descriptor, started.elapsed());
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    endpoint = %self.name,
                    type_id = descriptor.id,
                    handler = %descriptor.handler_kind,
                    error = %e,
                    "Dispatch failed, continuing with next envelope"
                );
                self.observer.on_error(&e);
            }
        }
    }

    /// Dispatch everything currently queued without waiting for more.
    ///
    /// Per-message failures are counted and reported, never returned. Fails
    /// with `QueueClosed` only if the queue was already closed.
    pub fn drain_pending(&self, ctx: &C) -> Result<DrainReport> {
        let mut report = DrainReport::default();
        while let Some(envelope) = self.queue.dequeue_next()? {
            self.dispatch_one(ctx, envelope, &mut report);
        }
        Ok(report)
    }

    /// The drain loop.
    ///
    /// Waits for envelopes and dispatches them in order until the queue
    /// closes. Once disconnected, pending envelopes get `drain_timeout` to be
    /// dispatched; whatever is left after that is discarded.
    #[instrument(skip_all, fields(endpoint = %self.name))]
    pub async fn run(&self, ctx: &C) -> DrainReport {
        let mut report = DrainReport::default();
        let mut draining_since: Option<Instant> = None;

        loop {
            if self.queue.state() == QueueState::Draining {
                let since = *draining_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.drain_timeout {
                    report.discarded = self.queue.force_close();
                    if report.discarded > 0 {
                        self.observer.on_discarded(report.discarded);
                    }
                    break;
                }
            }

            match self.queue.recv().await {
                Ok(Some(envelope)) => self.dispatch_one(ctx, envelope, &mut report),
                Ok(None) | Err(ProtocolError::QueueClosed) => break,
                Err(e) => {
                    self.observer.on_error(&e);
                    break;
                }
            }
        }

        info!(
            dispatched = report.dispatched,
            failed = report.failed,
            discarded = report.discarded,
            "Drain loop finished"
        );
        report
    }
}

impl<C: 'static> Drop for Endpoint<C> {
    fn drop(&mut self) {
        if !self.queue.is_closed() {
            let discarded = self.queue.force_close();
            if discarded > 0 {
                self.observer.on_discarded(discarded);
            }
        }
    }
}
