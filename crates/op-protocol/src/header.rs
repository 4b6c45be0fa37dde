//! Telegram header and the telegram wire unit.
//!
//! Every telegram starts with the same 20 ASCII bytes:
//!
//! ```text
//! 1-4   Length                 (header + data, terminator excluded)
//! 5-8   MID
//! 9-11  Revision
//! 12    No ack flag
//! 13-14 Station ID
//! 15-16 Spindle ID
//! 17-18 Sequence number
//! 19    Number of message parts
//! 20    Message part number
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::catalog::Message;
use crate::codec::{self, CodecError, HEADER_LEN};
use crate::schema::{Addr, Encodable, FieldSpec, Layout, Record};

/// Header schema.
pub const HEADER_FIELDS: &[FieldSpec] = &[
    FieldSpec::int("length", Addr::range(1, 4)),
    FieldSpec::int("mid", Addr::range(5, 8)),
    FieldSpec::int("revision", Addr::range(9, 11)),
    FieldSpec::boolean("no_ack", Addr::at(12)),
    FieldSpec::int("station_id", Addr::range(13, 14)),
    FieldSpec::int("spindle_id", Addr::range(15, 16)),
    FieldSpec::int("sequence_number", Addr::range(17, 18)),
    FieldSpec::int("message_parts", Addr::at(19)),
    FieldSpec::int("message_part_number", Addr::at(20)),
];

/// The fixed telegram header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header plus data length, terminator excluded.
    pub length: u16,
    /// Message identifier.
    pub mid: u16,
    /// Layout revision of the MID. Spaces decode as 0.
    pub revision: u16,
    /// Subscription without push acknowledgements.
    pub no_ack: bool,
    /// Station addressed in multi-station controllers.
    pub station_id: u8,
    /// Spindle addressed in multi-spindle controllers.
    pub spindle_id: u8,
    /// Link level sequence number.
    pub sequence_number: u8,
    /// Message linking: number of parts.
    pub message_parts: u8,
    /// Message linking: this part's index.
    pub message_part_number: u8,
}

impl Header {
    /// Create a header for `mid` at `revision` with no data.
    #[must_use]
    pub fn new(mid: u16, revision: u16) -> Self {
        Self {
            length: HEADER_LEN as u16,
            mid,
            revision,
            ..Self::default()
        }
    }
}

impl Layout for Header {
    const FIELDS: &'static [FieldSpec] = HEADER_FIELDS;

    fn from_record(record: &Record) -> Result<Self, CodecError> {
        Ok(Self {
            length: record.int("length")?,
            mid: record.int("mid")?,
            revision: record.int("revision")?,
            no_ack: record.boolean("no_ack")?,
            station_id: record.int("station_id")?,
            spindle_id: record.int("spindle_id")?,
            sequence_number: record.int("sequence_number")?,
            message_parts: record.int("message_parts")?,
            message_part_number: record.int("message_part_number")?,
        })
    }
}

impl Encodable for Header {
    fn to_record(&self) -> Record {
        Record::with_capacity(HEADER_FIELDS.len())
            .with("length", i64::from(self.length))
            .with("mid", i64::from(self.mid))
            .with("revision", i64::from(self.revision))
            .with("no_ack", self.no_ack)
            .with("station_id", i64::from(self.station_id))
            .with("spindle_id", i64::from(self.spindle_id))
            .with("sequence_number", i64::from(self.sequence_number))
            .with("message_parts", i64::from(self.message_parts))
            .with("message_part_number", i64::from(self.message_part_number))
    }
}

/// One telegram: decoded header plus the raw bytes it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telegram {
    header: Header,
    raw: Bytes,
}

impl Telegram {
    /// Build a telegram for `mid` at `revision` carrying `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the telegram does not fit the header's length field.
    pub fn new(mid: u16, revision: u16, data: impl AsRef<[u8]>) -> Result<Self, CodecError> {
        Self::with_header(Header::new(mid, revision), data)
    }

    /// Build a telegram from a header template; the length is recomputed.
    ///
    /// # Errors
    ///
    /// Returns an error if the telegram does not fit the header's length field.
    pub fn with_header(mut header: Header, data: impl AsRef<[u8]>) -> Result<Self, CodecError> {
        let data = data.as_ref();
        let length = HEADER_LEN + data.len();
        header.length = u16::try_from(length).map_err(|_| CodecError::FieldOverflow {
            field: "length",
            width: 4,
        })?;

        let mut raw = codec::encode(&header)?;
        raw.extend_from_slice(data);
        Ok(Self {
            header,
            raw: Bytes::from(raw),
        })
    }

    /// Decode the header of a raw telegram (terminator already removed).
    ///
    /// # Errors
    ///
    /// Returns an error if the telegram is shorter than a header or a header
    /// field is malformed.
    pub fn decode(raw: impl Into<Bytes>) -> Result<Self, CodecError> {
        let raw = raw.into();
        if raw.len() < HEADER_LEN {
            return Err(CodecError::TooShort(raw.len()));
        }
        let header = codec::decode::<Header>(&raw[..HEADER_LEN])?;
        Ok(Self { header, raw })
    }

    /// The decoded header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Message identifier.
    #[must_use]
    pub fn mid(&self) -> u16 {
        self.header.mid
    }

    /// Bytes after the header.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.raw[HEADER_LEN..]
    }

    /// The complete telegram as sent or received.
    #[must_use]
    pub fn as_bytes(&self) -> &Bytes {
        &self.raw
    }

    /// Consume into the raw bytes.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.raw
    }

    /// Decode the payload as catalog message `M`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MidMismatch`] if the telegram carries another
    /// MID, or any decoding error of the payload layout.
    pub fn payload<M: Message>(&self) -> Result<M, CodecError> {
        if self.header.mid != M::MID {
            return Err(CodecError::MidMismatch {
                expected: M::MID,
                actual: self.header.mid,
            });
        }
        codec::decode::<M>(&self.raw)
    }
}

impl std::fmt::Display for Telegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.raw))
    }
}
