//! # Listener Queue
//!
//! Per-connection FIFO of decoded envelopes waiting for dispatch.
//!
//! ## Lifecycle
//! ```text
//! Open --disconnect()--> Draining --(empty on dequeue)--> Closed
//!   \___________________ force_close() ___________________/
//! ```
//! - `Open`: enqueue and dequeue both accepted.
//! - `Draining`: enqueue fails with `QueueClosed`; the consumer finishes what is pending.
//! - `Closed`: terminal; every operation fails with `QueueClosed`. A closed
//!   queue is never reopened, a new connection gets a new queue.
//!
//! The decode path is the producer and the drain loop the consumer. The
//! consumer suspends only while the queue is open and empty.

use crate::config::QueueConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Envelope;
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Queue lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Open,
    Draining,
    Closed,
}

/// Outcome of one non-blocking take
enum Next {
    Item(Envelope),
    /// Open and empty: more may arrive
    Empty,
    /// Drained: the queue closed during this take
    Finished,
}

struct Inner {
    state: QueueState,
    pending: VecDeque<Envelope>,
}

pub struct ListenerQueue {
    name: String,
    inner: Mutex<Inner>,
    notify: Notify,
    warn_depth: usize,
}

impl std::fmt::Debug for ListenerQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ListenerQueue")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("pending", &inner.pending.len())
            .finish()
    }
}

impl Default for ListenerQueue {
    fn default() -> Self {
        Self::new("listener")
    }
}

impl ListenerQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, &QueueConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: &QueueConfig) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                state: QueueState::Open,
                pending: VecDeque::new(),
            }),
            notify: Notify::new(),
            warn_depth: config.warn_depth,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // No user code runs under this lock, so a poisoned guard still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> QueueState {
        self.lock().state
    }

    pub fn is_closed(&self) -> bool {
        self.state() == QueueState::Closed
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Append to the tail. Fails with `QueueClosed` unless the queue is open.
    pub fn enqueue(&self, envelope: Envelope) -> Result<()> {
        let depth = {
            let mut inner = self.lock();
            if inner.state != QueueState::Open {
                return Err(ProtocolError::QueueClosed);
            }
            inner.pending.push_back(envelope);
            inner.pending.len()
        };

        if self.warn_depth > 0 && depth == self.warn_depth + 1 {
            warn!(queue = %self.name, depth, "Listener queue is backing up");
        }
        self.notify.notify_one();
        Ok(())
    }

    fn take(&self) -> Result<Next> {
        let mut inner = self.lock();
        match inner.state {
            QueueState::Closed => Err(ProtocolError::QueueClosed),
            QueueState::Open => Ok(inner.pending.pop_front().map_or(Next::Empty, Next::Item)),
            QueueState::Draining => match inner.pending.pop_front() {
                Some(envelope) => Ok(Next::Item(envelope)),
                None => {
                    inner.state = QueueState::Closed;
                    drop(inner);
                    info!(queue = %self.name, "Listener queue drained and closed");
                    self.notify.notify_waiters();
                    Ok(Next::Finished)
                }
            },
        }
    }

    /// Remove and return the head, or `None` if nothing is pending.
    ///
    /// On a draining queue with nothing left this closes the queue and
    /// returns `None`; later calls fail with `QueueClosed`.
    pub fn dequeue_next(&self) -> Result<Option<Envelope>> {
        match self.take()? {
            Next::Item(envelope) => Ok(Some(envelope)),
            Next::Empty | Next::Finished => Ok(None),
        }
    }

    /// Inspect the head without consuming it
    pub fn peek_next(&self) -> Result<Option<Envelope>> {
        let inner = self.lock();
        if inner.state == QueueState::Closed {
            return Err(ProtocolError::QueueClosed);
        }
        Ok(inner.pending.front().cloned())
    }

    /// Wait for the next envelope.
    ///
    /// Suspends while the queue is open and empty. Returns `Ok(None)` once a
    /// disconnected queue has been fully drained.
    pub async fn recv(&self) -> Result<Option<Envelope>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.take()? {
                Next::Item(envelope) => return Ok(Some(envelope)),
                Next::Finished => return Ok(None),
                Next::Empty => notified.await,
            }
        }
    }

    /// Stop accepting envelopes; pending ones remain for the consumer.
    ///
    /// Returns `false` if the queue was not open.
    pub fn disconnect(&self) -> bool {
        let pending = {
            let mut inner = self.lock();
            if inner.state != QueueState::Open {
                return false;
            }
            inner.state = QueueState::Draining;
            inner.pending.len()
        };

        debug!(queue = %self.name, pending, "Listener queue draining");
        self.notify.notify_waiters();
        self.notify.notify_one();
        true
    }

    /// Close immediately, discarding anything pending. Returns the number discarded.
    pub fn force_close(&self) -> usize {
        let discarded = {
            let mut inner = self.lock();
            inner.state = QueueState::Closed;
            let count = inner.pending.len();
            inner.pending.clear();
            count
        };

        if discarded > 0 {
            warn!(queue = %self.name, discarded, "Listener queue force-closed");
        } else {
            debug!(queue = %self.name, "Listener queue closed");
        }
        self.notify.notify_waiters();
        self.notify.notify_one();
        discarded
    }

    /// Consume the queue as a stream that ends when the queue closes
    pub fn into_stream(self: Arc<Self>) -> impl Stream<Item = Envelope> {
        stream::unfold(self, |queue| async move {
            let next = queue.recv().await;
            match next {
                Ok(Some(envelope)) => Some((envelope, queue)),
                _ => None,
            }
        })
    }
}

impl Drop for ListenerQueue {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.pending.is_empty() {
            debug!(
                queue = %self.name,
                discarded = inner.pending.len(),
                "Listener queue dropped with pending envelopes"
            );
        }
    }
}
