//! TCP dialer.

use async_trait::async_trait;
use op_protocol::FrameCodec;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tracing::{debug, info, warn};

use crate::stream::StreamConnection;
use crate::traits::{Connection, Dialer, TransportError};

/// TCP dialer configuration.
#[derive(Debug, Clone)]
pub struct TcpDialerConfig {
    /// Controller host name or address.
    pub host: String,
    /// Controller port.
    pub port: u16,
    /// Deadline covering resolution and connect.
    pub connect_timeout: Duration,
    /// Enable TCP keep-alive on the socket.
    pub keepalive: bool,
    /// Largest telegram accepted from the controller.
    pub max_telegram_size: usize,
}

impl Default for TcpDialerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4545,
            connect_timeout: Duration::from_secs(5),
            keepalive: true,
            max_telegram_size: op_protocol::codec::MAX_TELEGRAM_SIZE,
        }
    }
}

/// Dials a controller over TCP.
#[derive(Debug, Clone)]
pub struct TcpDialer {
    config: TcpDialerConfig,
}

impl TcpDialer {
    /// Create a dialer.
    #[must_use]
    pub fn new(config: TcpDialerConfig) -> Self {
        Self { config }
    }

    /// `host:port` being dialed.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Open a TCP connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve, every address refuses
    /// the connection, or the deadline passes.
    pub async fn connect_tcp(&self) -> Result<StreamConnection<TcpStream>, TransportError> {
        let target = self.target();
        let stream = tokio::time::timeout(self.config.connect_timeout, self.dial(&target))
            .await
            .map_err(|_| {
                warn!(target = %target, "Connect timed out");
                TransportError::Timeout
            })??;

        stream.set_nodelay(true)?;
        let peer = stream.peer_addr().map(|addr| addr.to_string()).unwrap_or(target);
        info!(peer = %peer, keepalive = self.config.keepalive, "Connected");

        Ok(
            StreamConnection::with_codec(stream, FrameCodec::new(self.config.max_telegram_size))
                .with_remote_addr(peer),
        )
    }

    async fn dial(&self, target: &str) -> Result<TcpStream, TransportError> {
        let mut last_error = None;

        for addr in lookup_host(target).await? {
            match self.dial_addr(addr).await {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(addr = %addr, error = %e, "Connect attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.map_or_else(|| TransportError::Resolve(target.to_string()), TransportError::Io))
    }

    async fn dial_addr(&self, addr: SocketAddr) -> std::io::Result<TcpStream> {
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_keepalive(self.config.keepalive)?;
        socket.connect(addr).await
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        Ok(Box::new(self.connect_tcp().await?))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn dialer(port: u16) -> TcpDialer {
        TcpDialer::new(TcpDialerConfig {
            port,
            ..TcpDialerConfig::default()
        })
    }

    #[test]
    fn test_default_config() {
        let config = TcpDialerConfig::default();
        assert_eq!(config.port, 4545);
        assert!(config.keepalive);
        assert_eq!(dialer(4545).target(), "127.0.0.1:4545");
    }

    #[tokio::test]
    async fn test_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let controller = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 21];
            socket.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf, b"00209999001000000000\0");
            socket.write_all(&buf).await.unwrap();
        });

        let mut conn = dialer(port).connect().await.unwrap();
        assert!(conn.is_open());
        assert!(conn.remote_addr().unwrap().ends_with(&port.to_string()));

        conn.send(Bytes::from_static(b"00209999001000000000"))
            .await
            .unwrap();
        let echoed = conn.recv().await.unwrap().unwrap();
        assert_eq!(&echoed[..], b"00209999001000000000");

        controller.await.unwrap();
        assert!(conn.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        assert!(matches!(
            dialer(port).connect().await,
            Err(TransportError::Io(_))
        ));
    }
}
