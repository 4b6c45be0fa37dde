//! Field schemas for Open Protocol telegrams.
//!
//! A schema is an ordered table of [`FieldSpec`]s interpreted by the generic
//! routines in [`crate::codec`]. Each field names its byte range (absolute,
//! 1-based and inclusive, or relative to the running cursor), its value kind
//! and, for the self-describing layouts of later revisions, the two-digit
//! position ordinal transmitted immediately before the field.
//!
//! Constructors are `const fn` so a malformed schema fails to compile.

use crate::codec::CodecError;

/// Byte addressing mode of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addr {
    /// Fixed 1-based inclusive range into the telegram.
    Absolute { start: usize, end: usize },
    /// `len` bytes starting at the cursor left by the previous field.
    Relative(usize),
}

impl Addr {
    /// An absolute range `start..=end`.
    #[must_use]
    pub const fn range(start: usize, end: usize) -> Self {
        assert!(start >= 1, "field ranges are 1-based");
        assert!(start <= end, "field range start exceeds its end");
        Addr::Absolute { start, end }
    }

    /// A single absolute byte.
    #[must_use]
    pub const fn at(pos: usize) -> Self {
        Self::range(pos, pos)
    }

    /// A relative range of `len` bytes.
    #[must_use]
    pub const fn next(len: usize) -> Self {
        assert!(len >= 1, "relative fields need a width");
        Addr::Relative(len)
    }

    /// Resolve to an inclusive 1-based `(start, end)` given the running cursor.
    #[must_use]
    pub fn resolve(&self, cursor: usize) -> (usize, usize) {
        match *self {
            Addr::Absolute { start, end } => (start, end),
            Addr::Relative(len) => (cursor, cursor + len - 1),
        }
    }

    /// Field width in bytes.
    #[must_use]
    pub fn width(&self) -> usize {
        match *self {
            Addr::Absolute { start, end } => end - start + 1,
            Addr::Relative(len) => len,
        }
    }

    /// Whether the range follows the cursor.
    #[must_use]
    pub fn is_relative(&self) -> bool {
        matches!(self, Addr::Relative(_))
    }
}

/// Scalar value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// Base-10 integer, surrounding spaces ignored.
    Int,
    /// Single digit, `0` is false.
    Bool,
    /// Raw ASCII, copied verbatim.
    Str,
    /// Decimal number as transmitted, no implicit scaling.
    Float,
}

impl Kind {
    /// Value left in place when the token is all spaces.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            Kind::Int => Value::Int(0),
            Kind::Bool => Value::Bool(false),
            Kind::Str => Value::Str(String::new()),
            Kind::Float => Value::Float(0.0),
        }
    }
}

/// Shape of a field.
#[derive(Debug, Clone, Copy)]
pub enum FieldLayout {
    /// A single value.
    Scalar { addr: Addr, kind: Kind },
    /// `count` homogeneous sub-records laid out contiguously from the cursor.
    Group {
        /// Absolute range holding the occurrence count.
        count: Addr,
        /// Sub-record schema, normally relative fields only.
        fields: &'static [FieldSpec],
    },
}

/// One entry of a schema table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name, the key in the decoded [`Record`].
    pub name: &'static str,
    /// Addressing and kind.
    pub layout: FieldLayout,
    /// Expected ordinal of the two digits preceding the field.
    pub position: Option<u8>,
}

impl FieldSpec {
    const fn scalar(name: &'static str, addr: Addr, kind: Kind) -> Self {
        Self {
            name,
            layout: FieldLayout::Scalar { addr, kind },
            position: None,
        }
    }

    /// An integer field.
    #[must_use]
    pub const fn int(name: &'static str, addr: Addr) -> Self {
        Self::scalar(name, addr, Kind::Int)
    }

    /// A boolean field.
    #[must_use]
    pub const fn boolean(name: &'static str, addr: Addr) -> Self {
        Self::scalar(name, addr, Kind::Bool)
    }

    /// A string field.
    #[must_use]
    pub const fn string(name: &'static str, addr: Addr) -> Self {
        Self::scalar(name, addr, Kind::Str)
    }

    /// A floating point field.
    #[must_use]
    pub const fn float(name: &'static str, addr: Addr) -> Self {
        Self::scalar(name, addr, Kind::Float)
    }

    /// A repeated group whose count lives at `count` (an absolute range).
    #[must_use]
    pub const fn group(name: &'static str, count: Addr, fields: &'static [FieldSpec]) -> Self {
        assert!(
            matches!(count, Addr::Absolute { .. }),
            "group counts must be absolute"
        );
        Self {
            name,
            layout: FieldLayout::Group { count, fields },
            position: None,
        }
    }

    /// Require the two digits before the field to equal `ordinal`.
    #[must_use]
    pub const fn tagged(self, ordinal: u8) -> Self {
        assert!(ordinal <= 99, "position ordinals have two digits");
        Self {
            name: self.name,
            layout: self.layout,
            position: Some(ordinal),
        }
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    Float(f64),
    Group(Vec<Record>),
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

/// Ordered field values produced by the decoder and consumed by the encoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty record with room for `capacity` fields.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Append a field.
    pub fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push((name, value));
    }

    /// Builder form of [`Record::push`].
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Look up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    fn require(&self, name: &'static str) -> Result<&Value, CodecError> {
        self.get(name).ok_or(CodecError::MissingField(name))
    }

    /// Read an integer field, narrowing it to `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing, not an integer, or does not fit `T`.
    pub fn int<T: TryFrom<i64>>(&self, name: &'static str) -> Result<T, CodecError> {
        match self.require(name)? {
            Value::Int(v) => T::try_from(*v).map_err(|_| CodecError::ValueRange {
                field: name,
                value: *v,
            }),
            _ => Err(CodecError::FieldType(name)),
        }
    }

    /// Read a boolean field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a boolean.
    pub fn boolean(&self, name: &'static str) -> Result<bool, CodecError> {
        match self.require(name)? {
            Value::Bool(v) => Ok(*v),
            _ => Err(CodecError::FieldType(name)),
        }
    }

    /// Read a string field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a string.
    pub fn string(&self, name: &'static str) -> Result<String, CodecError> {
        match self.require(name)? {
            Value::Str(v) => Ok(v.clone()),
            _ => Err(CodecError::FieldType(name)),
        }
    }

    /// Read a floating point field.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a float.
    pub fn float(&self, name: &'static str) -> Result<f64, CodecError> {
        match self.require(name)? {
            Value::Float(v) => Ok(*v),
            _ => Err(CodecError::FieldType(name)),
        }
    }

    /// Read the sub-records of a repeated group.
    ///
    /// # Errors
    ///
    /// Returns an error if the field is missing or not a group.
    pub fn group(&self, name: &'static str) -> Result<&[Record], CodecError> {
        match self.require(name)? {
            Value::Group(items) => Ok(items),
            _ => Err(CodecError::FieldType(name)),
        }
    }
}

/// A type with a declared field layout.
pub trait Layout: Sized {
    /// The schema table, in wire order.
    const FIELDS: &'static [FieldSpec];

    /// Build the typed value from a decoded record.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is missing or has the wrong type or range.
    fn from_record(record: &Record) -> Result<Self, CodecError>;
}

/// A layout that can also be encoded.
pub trait Encodable: Layout {
    /// Field values keyed by the names in [`Layout::FIELDS`].
    fn to_record(&self) -> Record;
}
