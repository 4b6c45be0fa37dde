//! # op-transport
//!
//! Connection layer for the Open Protocol client.
//!
//! Telegrams travel over a persistent byte stream, each followed by a NUL
//! terminator. This crate provides:
//!
//! - **Connection** - the framed telegram connection the session drives
//! - **Dialer** - something that opens connections
//! - **StreamConnection** - a connection over any `AsyncRead + AsyncWrite`
//! - **TcpDialer** - TCP with keep-alive and a connect deadline
//!
//! ```rust,ignore
//! use op_transport::{Connection, Dialer, TcpDialer};
//!
//! async fn dump(dialer: TcpDialer) {
//!     let mut conn = dialer.connect().await.unwrap();
//!     while let Ok(Some(telegram)) = conn.recv().await {
//!         println!("{}", String::from_utf8_lossy(&telegram));
//!     }
//! }
//! ```

pub mod stream;
pub mod tcp;
pub mod traits;

pub use stream::StreamConnection;
pub use tcp::{TcpDialer, TcpDialerConfig};
pub use traits::{Connection, ConnectionId, Dialer, TransportError};
