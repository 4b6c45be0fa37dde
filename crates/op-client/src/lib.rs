//! # op-client
//!
//! Open Protocol client for tightening controllers.
//!
//! A [`Client`] owns one controller connection. Commands (communication
//! start/stop, subscribe, unsubscribe, keep-alive) wait for their paired
//! response under a per-command deadline; acknowledges are fire-and-forget.
//! Subscribed result pushes are delivered per topic, in wire order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use op_client::{Client, SessionConfig};
//! use op_protocol::{decode_push, PushPayload};
//!
//! async fn run() -> Result<(), op_client::ClientError> {
//!     let client = Client::connect_tcp("10.0.0.7", 4545, &SessionConfig::default()).await?;
//!     client.start_communication().await?;
//!
//!     let results = client.last_tightening_result_subscribe().await?;
//!     while let Some(telegram) = results.recv().await {
//!         if let Ok(PushPayload::LastTightening(result)) = decode_push(&telegram) {
//!             println!("tightening {} ok={}", result.tightening_id, result.tightening_status);
//!         }
//!         client.last_tightening_result_acknowledge().await?;
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
mod session;

pub use client::Client;
pub use config::{Config, SessionConfig};
pub use error::ClientError;
pub use session::SessionState;

pub use op_core::{Reader, Topic};
pub use op_protocol::{ErrorCode, NegativeAck, Telegram};
