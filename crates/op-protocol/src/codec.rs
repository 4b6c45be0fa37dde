//! Codec for Open Protocol telegrams.
//!
//! Two layers live here:
//!
//! - the field codec, which walks a schema table ([`crate::schema`]) over an
//!   ASCII buffer keeping a running cursor, and
//! - the framing helpers, which split a byte stream on the NUL terminator.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::schema::{Encodable, FieldLayout, FieldSpec, Kind, Layout, Record, Value};

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 20;

/// Telegram terminator on the wire.
pub const TERMINATOR: u8 = 0x00;

/// Largest telegram a four digit length field can describe.
pub const MAX_TELEGRAM_SIZE: usize = 9999;

/// Errors raised while decoding or encoding telegrams.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Buffer shorter than the fixed header.
    #[error("Invalid header: header size should be {HEADER_LEN} bytes but telegram has only {0}")]
    TooShort(usize),

    /// Field range falls outside the buffer.
    #[error("Field range {start}-{end} is outside the telegram of {len} bytes")]
    OutOfRange { start: usize, end: usize, len: usize },

    /// Position ordinal before a field differs from the schema.
    #[error("Position {found:02} is not equal to expected {expected:02}")]
    PositionMismatch { found: u8, expected: u8 },

    /// Position ordinal bytes are not two digits.
    #[error("Invalid position token {token:?} before field {field}")]
    InvalidPosition { field: &'static str, token: String },

    /// Token cannot be converted to the field kind.
    #[error("Invalid data token {token:?} for field {field}")]
    InvalidToken { field: &'static str, token: String },

    /// Encoded value is wider than its field.
    #[error("Value of field {field} does not fit in {width} bytes")]
    FieldOverflow { field: &'static str, width: usize },

    /// Decoded integer does not fit the target type.
    #[error("Value {value} of field {field} is out of range")]
    ValueRange { field: &'static str, value: i64 },

    /// Record lacks a field named by the schema.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Record value has a different kind than the schema.
    #[error("Field {0} has an unexpected value type")]
    FieldType(&'static str),

    /// Telegram carries a different MID than the requested payload type.
    #[error("Expected MID {expected:04}, got {actual:04}")]
    MidMismatch { expected: u16, actual: u16 },

    /// Schema feature the encoder does not handle.
    #[error("Not supported by the encoder: {0}")]
    Unsupported(&'static str),

    /// No terminator within the maximum telegram size.
    #[error("Telegram size {0} exceeds maximum {MAX_TELEGRAM_SIZE} without terminator")]
    FrameTooLarge(usize),
}

/// A decoded record together with the cursor position after the last field.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Field values.
    pub record: Record,
    /// 1-based position immediately after the last consumed byte.
    pub cursor: usize,
}

/// Decode a typed layout from a raw telegram.
///
/// # Errors
///
/// Returns an error if a field is out of range, a position tag mismatches or a
/// token cannot be converted.
pub fn decode<T: Layout>(raw: &[u8]) -> Result<T, CodecError> {
    let record = decode_record(raw, T::FIELDS)?;
    T::from_record(&record)
}

/// Decode `fields` from `raw` into a [`Record`].
///
/// # Errors
///
/// See [`decode`].
pub fn decode_record(raw: &[u8], fields: &'static [FieldSpec]) -> Result<Record, CodecError> {
    decode_with_cursor(raw, fields).map(|decoded| decoded.record)
}

/// Decode `fields` from `raw`, also reporting the final cursor.
///
/// # Errors
///
/// See [`decode`].
pub fn decode_with_cursor(raw: &[u8], fields: &'static [FieldSpec]) -> Result<Decoded, CodecError> {
    let (record, cursor) = decode_fields(raw, fields, 1)?;
    Ok(Decoded { record, cursor })
}

fn decode_fields(
    raw: &[u8],
    fields: &'static [FieldSpec],
    mut cursor: usize,
) -> Result<(Record, usize), CodecError> {
    let mut record = Record::with_capacity(fields.len());

    for field in fields {
        match field.layout {
            FieldLayout::Scalar { addr, kind } => {
                let (mut start, mut end) = addr.resolve(cursor);
                if let Some(expected) = field.position {
                    // A relative field's ordinal sits at the cursor itself.
                    if addr.is_relative() {
                        start += 2;
                        end += 2;
                    }
                    check_position(raw, field.name, start, expected)?;
                }

                let token = slice(raw, start, end)?;
                let value = if is_blank(token) {
                    kind.default_value()
                } else {
                    convert(field.name, kind, token)?
                };
                record.push(field.name, value);
                cursor = end + 1;
            }
            FieldLayout::Group { count, fields: item } => {
                let (start, end) = count.resolve(cursor);
                let token = slice(raw, start, end)?;
                let occurrences = if is_blank(token) {
                    0
                } else {
                    usize::try_from(parse_int(field.name, token)?).map_err(|_| {
                        CodecError::InvalidToken {
                            field: field.name,
                            token: text(token),
                        }
                    })?
                };

                if occurrences > 0 {
                    if let Some(expected) = field.position {
                        check_position(raw, field.name, cursor + 2, expected)?;
                        cursor += 2;
                    }
                }

                let mut items = Vec::with_capacity(occurrences);
                for _ in 0..occurrences {
                    let (sub, next) = decode_fields(raw, item, cursor)?;
                    items.push(sub);
                    cursor = next;
                }
                record.push(field.name, Value::Group(items));
            }
        }
    }

    Ok((record, cursor))
}

/// Check the two ASCII digits at `start-2..=start-1` against `expected`.
fn check_position(
    raw: &[u8],
    field: &'static str,
    start: usize,
    expected: u8,
) -> Result<(), CodecError> {
    if start < 3 {
        return Err(CodecError::OutOfRange {
            start,
            end: start,
            len: raw.len(),
        });
    }
    let token = slice(raw, start - 2, start - 1)?;
    let found = std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or_else(|| CodecError::InvalidPosition {
            field,
            token: text(token),
        })?;

    if found != expected {
        return Err(CodecError::PositionMismatch { found, expected });
    }
    Ok(())
}

fn slice(raw: &[u8], start: usize, end: usize) -> Result<&[u8], CodecError> {
    if start < 1 || end > raw.len() || start > end {
        return Err(CodecError::OutOfRange {
            start,
            end,
            len: raw.len(),
        });
    }
    Ok(&raw[start - 1..end])
}

fn is_blank(token: &[u8]) -> bool {
    token.iter().all(|b| *b == b' ')
}

fn text(token: &[u8]) -> String {
    String::from_utf8_lossy(token).into_owned()
}

fn parse_int(field: &'static str, token: &[u8]) -> Result<i64, CodecError> {
    std::str::from_utf8(token)
        .ok()
        .and_then(|s| s.trim_matches(' ').parse::<i64>().ok())
        .ok_or_else(|| CodecError::InvalidToken {
            field,
            token: text(token),
        })
}

fn convert(field: &'static str, kind: Kind, token: &[u8]) -> Result<Value, CodecError> {
    match kind {
        Kind::Int => parse_int(field, token).map(Value::Int),
        Kind::Bool => std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|v| Value::Bool(v != 0))
            .ok_or_else(|| CodecError::InvalidToken {
                field,
                token: text(token),
            }),
        Kind::Str => Ok(Value::Str(text(token))),
        Kind::Float => std::str::from_utf8(token)
            .ok()
            .and_then(|s| s.trim_matches(' ').parse::<f64>().ok())
            .map(Value::Float)
            .ok_or_else(|| CodecError::InvalidToken {
                field,
                token: text(token),
            }),
    }
}

/// Encode a typed layout.
///
/// # Errors
///
/// Returns an error if a value is missing, has the wrong kind or does not fit
/// its field.
pub fn encode<T: Encodable>(value: &T) -> Result<Vec<u8>, CodecError> {
    encode_record(&value.to_record(), T::FIELDS)
}

/// Encode `record` following `fields`.
///
/// Integers are zero-padded on the left, booleans become `0`/`1` and strings
/// are left-justified and padded with spaces. A field with a position tag is
/// preceded by its two ordinal digits.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_record(record: &Record, fields: &'static [FieldSpec]) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(HEADER_LEN);

    for field in fields {
        let FieldLayout::Scalar { addr, kind } = field.layout else {
            return Err(CodecError::Unsupported("repeated groups"));
        };
        if let Some(ordinal) = field.position {
            raw.extend_from_slice(format!("{ordinal:02}").as_bytes());
        }

        let width = addr.width();
        let value = record
            .get(field.name)
            .ok_or(CodecError::MissingField(field.name))?;
        let token = match (kind, value) {
            (Kind::Int, Value::Int(v)) => format!("{v:0width$}"),
            (Kind::Bool, Value::Bool(v)) => format!("{:0>width$}", u8::from(*v)),
            (Kind::Str, Value::Str(v)) => format!("{v:<width$}"),
            (Kind::Float, Value::Float(v)) => format!("{v:>width$}"),
            _ => return Err(CodecError::FieldType(field.name)),
        };

        if token.len() > width {
            return Err(CodecError::FieldOverflow {
                field: field.name,
                width,
            });
        }
        raw.extend_from_slice(token.as_bytes());
    }

    Ok(raw)
}

/// Append `telegram` and its terminator to `buf`.
pub fn encode_frame(telegram: &[u8], buf: &mut BytesMut) {
    buf.reserve(telegram.len() + 1);
    buf.extend_from_slice(telegram);
    buf.put_u8(TERMINATOR);
}

/// Try to split the next terminated telegram off `buf`.
///
/// Returns `Ok(Some(telegram))` without the terminator, `Ok(None)` if more
/// data is needed, or an error if `max_size` bytes arrived with no terminator.
///
/// # Errors
///
/// Returns [`CodecError::FrameTooLarge`] on a runaway frame.
pub fn decode_from(buf: &mut BytesMut, max_size: usize) -> Result<Option<Bytes>, CodecError> {
    match buf.iter().position(|b| *b == TERMINATOR) {
        Some(pos) => {
            let telegram = buf.split_to(pos).freeze();
            // Drop the terminator.
            let _ = buf.split_to(1);
            Ok(Some(telegram))
        }
        None if buf.len() > max_size => Err(CodecError::FrameTooLarge(buf.len())),
        None => Ok(None),
    }
}

/// Codec for NUL-terminated telegram streams.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_telegram_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_TELEGRAM_SIZE)
    }
}

impl FrameCodec {
    /// Create a codec accepting telegrams up to `max_telegram_size` bytes.
    #[must_use]
    pub fn new(max_telegram_size: usize) -> Self {
        Self { max_telegram_size }
    }

    /// Largest accepted telegram.
    #[must_use]
    pub fn max_telegram_size(&self) -> usize {
        self.max_telegram_size
    }

    /// Frame a telegram into `buf`.
    pub fn encode(&self, telegram: &[u8], buf: &mut BytesMut) {
        encode_frame(telegram, buf);
    }

    /// Try to split the next telegram off `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error on a runaway frame.
    pub fn decode_from(&self, buf: &mut BytesMut) -> Result<Option<Bytes>, CodecError> {
        decode_from(buf, self.max_telegram_size)
    }
}

/// Start of the MID inside the header (0-based).
pub const MID_OFFSET: usize = 4;

/// The four ASCII MID digits of a raw telegram, if it holds a full header.
#[must_use]
pub fn mid_digits(raw: &[u8]) -> Option<[u8; 4]> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let mut digits = [0u8; 4];
    digits.copy_from_slice(&raw[MID_OFFSET..MID_OFFSET + 4]);
    Some(digits)
}
