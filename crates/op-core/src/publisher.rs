//! Close-safe publisher.
//!
//! A [`Publisher`] is written to by any number of tasks and read through one
//! or more [`Reader`] handles pulling from the same stream. Closing is
//! idempotent: blocked and future writers give up with
//! [`PublisherError::Closed`], items already accepted stay readable, and
//! readers then observe end-of-stream. A [`Writer`] is the write half alone
//! and does not keep the stream alive.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, Stream};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::trace;

/// Items a publisher buffers before writers wait for a reader.
pub const DEFAULT_CAPACITY: usize = 1;

/// Publisher errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PublisherError {
    /// The publisher was closed before the item was accepted.
    #[error("Publisher is closed")]
    Closed,
}

/// A closable channel with many writers.
pub struct Publisher<T> {
    writer: Writer<T>,
    reader: Reader<T>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
            reader: self.reader.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Publisher<T> {
    /// Create a publisher with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a publisher buffering up to `capacity` items.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        Self {
            writer: Writer {
                sender: Arc::new(Mutex::new(Some(sender))),
                closed: Arc::new(closed),
            },
            reader: Reader {
                receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            },
        }
    }

    /// Write an item, waiting for buffer space. See [`Writer::write`].
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Closed`] if the publisher is closed before
    /// the item is accepted.
    pub async fn write(&self, item: T) -> Result<(), PublisherError> {
        self.writer.write(item).await
    }

    /// Close the publisher. Safe to call any number of times from any task.
    pub fn close(&self) {
        self.writer.close();
    }

    /// Whether [`Publisher::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }

    /// Wait until the publisher is closed.
    pub async fn closed(&self) {
        self.writer.closed().await;
    }

    /// Whether both handles refer to the same publisher.
    #[must_use]
    pub fn same_channel(&self, other: &Publisher<T>) -> bool {
        self.writer.same_channel(&other.writer)
    }

    /// A read handle on the publisher's stream.
    #[must_use]
    pub fn reader(&self) -> Reader<T> {
        self.reader.clone()
    }

    /// A write handle that does not keep the stream alive.
    ///
    /// Once every [`Publisher`] and [`Reader`] is dropped, writes through the
    /// handle fail with [`PublisherError::Closed`].
    #[must_use]
    pub fn writer(&self) -> Writer<T> {
        self.writer.clone()
    }
}

/// Write side of a [`Publisher`].
pub struct Writer<T> {
    /// Taken on close; writers clone it per write.
    sender: Arc<Mutex<Option<mpsc::Sender<T>>>>,
    /// Close signal observed by blocked writers.
    closed: Arc<watch::Sender<bool>>,
}

impl<T> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            closed: Arc::clone(&self.closed),
        }
    }
}

impl<T> std::fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> Writer<T> {
    /// Write an item, waiting for buffer space.
    ///
    /// # Errors
    ///
    /// Returns [`PublisherError::Closed`] if the publisher is closed before
    /// the item is accepted, or if every reader is gone.
    pub async fn write(&self, item: T) -> Result<(), PublisherError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PublisherError::Closed)?;
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => Err(PublisherError::Closed),
            sent = sender.send(item) => sent.map_err(|_| PublisherError::Closed),
        }
    }

    /// Close the publisher. Idempotent.
    pub fn close(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.send_replace(true);
        if sender.is_some() {
            trace!("Publisher closed");
        }
    }

    /// Whether the publisher is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Wait until the publisher is closed.
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        // The sender lives as long as `self`.
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Whether both handles write to the same publisher.
    #[must_use]
    pub fn same_channel(&self, other: &Writer<T>) -> bool {
        Arc::ptr_eq(&self.closed, &other.closed)
    }
}

/// Read side of a [`Publisher`]. Clones share one stream.
pub struct Reader<T> {
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
        }
    }
}

impl<T> std::fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader").finish_non_exhaustive()
    }
}

impl<T> Reader<T> {
    /// Receive the next item, or `None` once the publisher is closed and drained.
    pub async fn recv(&self) -> Option<T> {
        self.receiver.lock().await.recv().await
    }

    /// Take an item if one is ready.
    #[must_use]
    pub fn try_recv(&self) -> Option<T> {
        self.receiver.try_lock().ok()?.try_recv().ok()
    }

    /// Consume the reader into a stream ending when the publisher closes.
    pub fn into_stream(self) -> impl Stream<Item = T> {
        stream::unfold(self, |reader| async move {
            let item = reader.recv().await?;
            Some((item, reader))
        })
    }
}
