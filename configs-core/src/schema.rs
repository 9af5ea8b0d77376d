//! Schema definitions and the generic datum value tree.
//!
//! A [`ConfigSchema`] fully describes the binary layout of one stored record
//! version. The writer's schema travels to the schema registry as JSON and is
//! resolved back by fingerprint at decode time; the codec in [`crate::codec`]
//! walks it to turn payload bytes into a [`Datum`] without any knowledge of
//! the reader's concrete type.

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

/// Value types a schema field can take.
///
/// This is a closed set: every stored config is built from these kinds, and
/// the codec matches on them exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Single presence byte.
    Boolean,
    /// Zigzag varint signed integer.
    Long,
    /// Length-prefixed UTF-8.
    String,
    /// Length-prefixed raw bytes.
    Bytes,
    /// Exactly `size` raw bytes, no length prefix.
    Fixed { size: usize },
    /// Symbol index into the declared symbol list.
    Enum { symbols: Vec<String> },
    /// Count-prefixed sequence of one kind.
    Array(Box<SchemaKind>),
    /// Count-prefixed string-keyed entries of one kind.
    Map(Box<SchemaKind>),
    /// Presence byte followed by the value when present.
    Optional(Box<SchemaKind>),
    /// Branch index followed by the selected branch's value.
    Union(Vec<SchemaKind>),
}

/// One named field of a record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub kind: SchemaKind,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: SchemaKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A complete record schema: the unit of registration and resolution.
///
/// Fields are ordered; the payload encodes them in declaration order with no
/// per-field framing, so decoding always requires the writer's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub name: String,
    pub fields: Vec<FieldSchema>,
}

impl ConfigSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Generic decoded value, shaped by the writer's schema.
///
/// A `Datum` is what the codec produces before the reader's type maps it
/// into a concrete struct, and what encoders produce before the codec
/// serializes it. Field-name information is preserved on records so readers
/// can pick the fields they know and drop the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Boolean(bool),
    Long(i64),
    Str(String),
    Bytes(Vec<u8>),
    Fixed(Vec<u8>),
    /// Enum symbol, by name.
    Symbol(String),
    Array(Vec<Datum>),
    /// String-keyed entries, in encoded order.
    Map(Vec<(String, Datum)>),
    Optional(Option<Box<Datum>>),
    /// Union value: branch index into the schema's kind list, plus the value.
    Branch(usize, Box<Datum>),
    /// Named fields, in schema order.
    Record(Vec<(String, Datum)>),
}

impl Datum {
    /// Wrap an optional value, boxing the present case.
    pub fn optional(value: Option<Datum>) -> Datum {
        Datum::Optional(value.map(Box::new))
    }

    /// Short name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Datum::Boolean(_) => "boolean",
            Datum::Long(_) => "long",
            Datum::Str(_) => "string",
            Datum::Bytes(_) => "bytes",
            Datum::Fixed(_) => "fixed",
            Datum::Symbol(_) => "symbol",
            Datum::Array(_) => "array",
            Datum::Map(_) => "map",
            Datum::Optional(_) => "optional",
            Datum::Branch(..) => "union",
            Datum::Record(_) => "record",
        }
    }

    pub fn into_boolean(self) -> Result<bool, EnvelopeError> {
        match self {
            Datum::Boolean(v) => Ok(v),
            other => Err(mismatch("boolean", &other)),
        }
    }

    pub fn into_long(self) -> Result<i64, EnvelopeError> {
        match self {
            Datum::Long(v) => Ok(v),
            other => Err(mismatch("long", &other)),
        }
    }

    pub fn into_str(self) -> Result<String, EnvelopeError> {
        match self {
            Datum::Str(v) => Ok(v),
            other => Err(mismatch("string", &other)),
        }
    }

    pub fn into_fixed(self) -> Result<Vec<u8>, EnvelopeError> {
        match self {
            Datum::Fixed(v) => Ok(v),
            other => Err(mismatch("fixed", &other)),
        }
    }

    pub fn into_symbol(self) -> Result<String, EnvelopeError> {
        match self {
            Datum::Symbol(v) => Ok(v),
            other => Err(mismatch("symbol", &other)),
        }
    }

    pub fn into_array(self) -> Result<Vec<Datum>, EnvelopeError> {
        match self {
            Datum::Array(v) => Ok(v),
            other => Err(mismatch("array", &other)),
        }
    }

    pub fn into_map(self) -> Result<Vec<(String, Datum)>, EnvelopeError> {
        match self {
            Datum::Map(v) => Ok(v),
            other => Err(mismatch("map", &other)),
        }
    }

    pub fn into_optional(self) -> Result<Option<Datum>, EnvelopeError> {
        match self {
            Datum::Optional(v) => Ok(v.map(|boxed| *boxed)),
            other => Err(mismatch("optional", &other)),
        }
    }

    pub fn into_branch(self) -> Result<(usize, Datum), EnvelopeError> {
        match self {
            Datum::Branch(index, value) => Ok((index, *value)),
            other => Err(mismatch("union", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &Datum) -> EnvelopeError {
    EnvelopeError::SchemaMismatch {
        reason: format!("expected {expected}, got {}", got.kind_name()),
    }
}

/// Field-by-name access into a decoded record datum.
///
/// `take` removes the field so a reader consumes each field at most once;
/// fields the reader never asks for are simply dropped, which is how
/// writer-only fields age out of the data without migrations.
#[derive(Debug)]
pub struct RecordReader {
    fields: Vec<(String, Datum)>,
}

impl RecordReader {
    pub fn new(datum: Datum) -> Result<Self, EnvelopeError> {
        match datum {
            Datum::Record(fields) => Ok(Self { fields }),
            other => Err(mismatch("record", &other)),
        }
    }

    /// Remove and return the named field, if the writer recorded it.
    pub fn take(&mut self, name: &str) -> Option<Datum> {
        let index = self.fields.iter().position(|(field, _)| field == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Take an optional field, treating a missing field as absent.
    ///
    /// Missing means the writer's schema predates the field; the reader's
    /// declared default for every optional field is "absent".
    pub fn take_optional(&mut self, name: &str) -> Result<Option<Datum>, EnvelopeError> {
        match self.take(name) {
            Some(datum) => datum.into_optional(),
            None => Ok(None),
        }
    }
}
