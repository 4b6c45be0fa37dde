//! # op-protocol
//!
//! Wire format of the Open Protocol used by tightening controllers.
//!
//! Telegrams are ASCII: a fixed 20 byte header followed by a MID specific
//! payload, terminated by a NUL byte on the wire. Payload layouts are declared
//! as schema tables and decoded by one generic routine.
//!
//! ## Modules
//!
//! - `schema` - field descriptors and decoded records
//! - `codec` - schema decoding/encoding and NUL framing
//! - `header` - the header and the [`Telegram`] wire unit
//! - `catalog` - payload types of the supported MIDs
//! - `mid` - MID constants
//!
//! ## Example
//!
//! ```rust
//! use op_protocol::{mid, Telegram};
//!
//! let start = Telegram::new(mid::COMMUNICATION_START, 1, b"").unwrap();
//! assert_eq!(start.as_bytes().as_ref(), b"00200001001000000000");
//!
//! let decoded = Telegram::decode(start.into_bytes()).unwrap();
//! assert_eq!(decoded.mid(), mid::COMMUNICATION_START);
//! ```

pub mod catalog;
pub mod codec;
pub mod header;
pub mod mid;
pub mod schema;

pub use catalog::{decode_push, ErrorCode, Message, NegativeAck, PushPayload};
pub use codec::{decode, encode, CodecError, FrameCodec};
pub use header::{Header, Telegram};
pub use schema::{Addr, Encodable, FieldSpec, Layout, Record};
