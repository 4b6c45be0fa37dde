//! Transport abstraction traits.
//!
//! The session only needs a framed telegram connection; how it is opened is
//! behind [`Dialer`].

use async_trait::async_trait;
use bytes::Bytes;
use op_protocol::CodecError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection identifier, used as a log field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Allocate the next identifier.
    #[must_use]
    pub fn generate() -> Self {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{n:x}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Send on a connection that is closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The connect deadline passed.
    #[error("Connect timed out")]
    Timeout,

    /// The peer sent an unframeable byte stream.
    #[error("Framing error: {0}")]
    Protocol(#[from] CodecError),

    /// Socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Host name resolved to nothing usable.
    #[error("Cannot resolve {0}")]
    Resolve(String),
}

/// Opens connections to a controller.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;

    /// Transport name, e.g. "tcp".
    fn name(&self) -> &'static str;
}

/// An open telegram connection.
///
/// Telegrams are passed without their NUL terminator; the connection adds
/// and strips it.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> &ConnectionId;

    /// Receive the next telegram.
    ///
    /// Returns `None` if the peer closed the stream. Cancelling the returned
    /// future loses no data.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;

    /// Send one telegram followed by the terminator.
    async fn send(&mut self, telegram: Bytes) -> Result<(), TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Peer address, if known.
    fn remote_addr(&self) -> Option<String> {
        None
    }

    /// Whether neither side has closed the connection.
    fn is_open(&self) -> bool;
}
