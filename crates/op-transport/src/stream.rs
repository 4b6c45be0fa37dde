//! Connection over any async byte stream.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use op_protocol::FrameCodec;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use crate::traits::{Connection, ConnectionId, TransportError};

/// A framed telegram connection over `S`.
pub struct StreamConnection<S> {
    id: ConnectionId,
    stream: S,
    remote_addr: Option<String>,
    is_open: AtomicBool,
    read_buffer: BytesMut,
    write_buffer: BytesMut,
    codec: FrameCodec,
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    /// Wrap `stream` with the default telegram size limit.
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self::with_codec(stream, FrameCodec::default())
    }

    /// Wrap `stream` using `codec` for framing.
    #[must_use]
    pub fn with_codec(stream: S, codec: FrameCodec) -> Self {
        Self {
            id: ConnectionId::generate(),
            stream,
            remote_addr: None,
            is_open: AtomicBool::new(true),
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(256),
            codec,
        }
    }

    /// Record the peer address.
    #[must_use]
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Bytes received but not yet returned as a telegram.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.read_buffer.len()
    }
}

#[async_trait]
impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            if let Some(telegram) = self.codec.decode_from(&mut self.read_buffer)? {
                trace!(connection = %self.id, len = telegram.len(), "Telegram received");
                return Ok(Some(telegram));
            }
            if !self.is_open.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let read = self.stream.read_buf(&mut self.read_buffer).await?;
            if read == 0 {
                if !self.read_buffer.is_empty() {
                    debug!(
                        connection = %self.id,
                        pending = self.read_buffer.len(),
                        "Stream ended inside a telegram"
                    );
                }
                self.is_open.store(false, Ordering::SeqCst);
                return Ok(None);
            }
        }
    }

    async fn send(&mut self, telegram: Bytes) -> Result<(), TransportError> {
        if !self.is_open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        self.write_buffer.clear();
        self.codec.encode(&telegram, &mut self.write_buffer);
        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        trace!(connection = %self.id, len = telegram.len(), "Telegram sent");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(connection = %self.id, "Closing connection");
        self.stream.shutdown().await?;
        Ok(())
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.clone()
    }

    fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }
}
