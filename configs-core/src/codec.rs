//! Writer-schema-driven binary codec.
//!
//! The payload carries no per-field framing: the writer's schema is the only
//! way to walk it. Integers are zigzag varints, strings and byte sequences
//! are length-prefixed, fixed values are raw, enums are symbol indices,
//! arrays and maps are count-prefixed, optionals carry a presence byte, and
//! unions a branch index. Decoding produces a [`Datum`] tree; mapping that
//! tree into a concrete config type is where old and new schema versions are
//! reconciled.

use crate::envelope::{seal, Fingerprint};
use crate::error::{ConfigResult, EnvelopeError};
use crate::schema::{ConfigSchema, Datum, SchemaKind};
use crate::types::ConfigValue;

/// Encode a config value into a complete envelope: marker, fingerprint,
/// schema-encoded payload.
pub fn encode_config<T: ConfigValue>(fingerprint: Fingerprint, value: &T) -> ConfigResult<Vec<u8>> {
    let payload = encode_datum(&T::schema(), &value.to_datum())?;
    Ok(seal(fingerprint, &payload))
}

/// Decode an envelope payload written under `writer` into the reader's type.
///
/// Fields the writer recorded but the reader does not know are dropped;
/// fields the reader declares but the writer lacked take the reader's
/// default (absent, for every optional field).
pub fn decode_config<T: ConfigValue>(writer: &ConfigSchema, payload: &[u8]) -> ConfigResult<T> {
    let datum = decode_datum(writer, payload)?;
    Ok(T::from_datum(datum)?)
}

/// Serialize a record datum against its schema.
pub fn encode_datum(schema: &ConfigSchema, datum: &Datum) -> Result<Vec<u8>, EnvelopeError> {
    let fields = match datum {
        Datum::Record(fields) => fields,
        other => {
            return Err(EnvelopeError::SchemaMismatch {
                reason: format!("expected record, got {}", other.kind_name()),
            })
        }
    };

    let mut out = Vec::new();
    for field in &schema.fields {
        let value = fields
            .iter()
            .find(|(name, _)| *name == field.name)
            .map(|(_, value)| value)
            .ok_or_else(|| EnvelopeError::SchemaMismatch {
                reason: format!("record is missing field {}", field.name),
            })?;
        write_value(&field.kind, value, &mut out)?;
    }
    Ok(out)
}

/// Deserialize a payload against the schema that wrote it.
///
/// Never panics on corrupt input; every malformed byte sequence maps to an
/// [`EnvelopeError`].
pub fn decode_datum(schema: &ConfigSchema, payload: &[u8]) -> Result<Datum, EnvelopeError> {
    let mut cursor = Cursor::new(payload);
    let mut fields = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        let value = read_value(&field.kind, &mut cursor)?;
        fields.push((field.name.clone(), value));
    }
    if !cursor.is_empty() {
        return Err(cursor.error("trailing bytes after payload"));
    }
    Ok(Datum::Record(fields))
}

fn write_value(kind: &SchemaKind, datum: &Datum, out: &mut Vec<u8>) -> Result<(), EnvelopeError> {
    match (kind, datum) {
        (SchemaKind::Boolean, Datum::Boolean(value)) => {
            out.push(u8::from(*value));
        }
        (SchemaKind::Long, Datum::Long(value)) => {
            write_uvarint(zigzag_encode(*value), out);
        }
        (SchemaKind::String, Datum::Str(value)) => {
            write_uvarint(value.len() as u64, out);
            out.extend_from_slice(value.as_bytes());
        }
        (SchemaKind::Bytes, Datum::Bytes(value)) => {
            write_uvarint(value.len() as u64, out);
            out.extend_from_slice(value);
        }
        (SchemaKind::Fixed { size }, Datum::Fixed(value)) => {
            if value.len() != *size {
                return Err(EnvelopeError::SchemaMismatch {
                    reason: format!("fixed value has {} bytes, schema wants {size}", value.len()),
                });
            }
            out.extend_from_slice(value);
        }
        (SchemaKind::Enum { symbols }, Datum::Symbol(symbol)) => {
            let index = symbols
                .iter()
                .position(|candidate| candidate == symbol)
                .ok_or_else(|| EnvelopeError::SchemaMismatch {
                    reason: format!("symbol {symbol} is not in the schema's symbol list"),
                })?;
            write_uvarint(index as u64, out);
        }
        (SchemaKind::Array(inner), Datum::Array(items)) => {
            write_uvarint(items.len() as u64, out);
            for item in items {
                write_value(inner, item, out)?;
            }
        }
        (SchemaKind::Map(inner), Datum::Map(entries)) => {
            write_uvarint(entries.len() as u64, out);
            for (key, value) in entries {
                write_uvarint(key.len() as u64, out);
                out.extend_from_slice(key.as_bytes());
                write_value(inner, value, out)?;
            }
        }
        (SchemaKind::Optional(inner), Datum::Optional(value)) => match value {
            Some(value) => {
                out.push(1);
                write_value(inner, value, out)?;
            }
            None => out.push(0),
        },
        (SchemaKind::Union(kinds), Datum::Branch(index, value)) => {
            let branch = kinds.get(*index).ok_or_else(|| EnvelopeError::SchemaMismatch {
                reason: format!("union branch {index} out of range ({} branches)", kinds.len()),
            })?;
            write_uvarint(*index as u64, out);
            write_value(branch, value, out)?;
        }
        (kind, datum) => {
            return Err(EnvelopeError::SchemaMismatch {
                reason: format!("cannot encode {} as {}", datum.kind_name(), kind_label(kind)),
            })
        }
    }
    Ok(())
}

fn read_value(kind: &SchemaKind, cursor: &mut Cursor<'_>) -> Result<Datum, EnvelopeError> {
    match kind {
        SchemaKind::Boolean => match cursor.read_byte()? {
            0 => Ok(Datum::Boolean(false)),
            1 => Ok(Datum::Boolean(true)),
            _ => Err(cursor.error("invalid boolean byte")),
        },
        SchemaKind::Long => Ok(Datum::Long(zigzag_decode(cursor.read_uvarint()?))),
        SchemaKind::String => {
            let len = cursor.read_len()?;
            let bytes = cursor.take(len)?;
            let value = std::str::from_utf8(bytes)
                .map_err(|_| cursor.error("invalid utf-8 in string"))?;
            Ok(Datum::Str(value.to_string()))
        }
        SchemaKind::Bytes => {
            let len = cursor.read_len()?;
            Ok(Datum::Bytes(cursor.take(len)?.to_vec()))
        }
        SchemaKind::Fixed { size } => Ok(Datum::Fixed(cursor.take(*size)?.to_vec())),
        SchemaKind::Enum { symbols } => {
            let index = cursor.read_uvarint()? as usize;
            let symbol = symbols
                .get(index)
                .ok_or_else(|| cursor.error("enum symbol index out of range"))?;
            Ok(Datum::Symbol(symbol.clone()))
        }
        SchemaKind::Array(inner) => {
            let count = cursor.read_len()?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(read_value(inner, cursor)?);
            }
            Ok(Datum::Array(items))
        }
        SchemaKind::Map(inner) => {
            let count = cursor.read_len()?;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let key_len = cursor.read_len()?;
                let key = std::str::from_utf8(cursor.take(key_len)?)
                    .map_err(|_| cursor.error("invalid utf-8 in map key"))?
                    .to_string();
                entries.push((key, read_value(inner, cursor)?));
            }
            Ok(Datum::Map(entries))
        }
        SchemaKind::Optional(inner) => match cursor.read_byte()? {
            0 => Ok(Datum::Optional(None)),
            1 => Ok(Datum::optional(Some(read_value(inner, cursor)?))),
            _ => Err(cursor.error("invalid optional presence byte")),
        },
        SchemaKind::Union(kinds) => {
            let index = cursor.read_uvarint()? as usize;
            let branch = kinds
                .get(index)
                .ok_or_else(|| cursor.error("union branch index out of range"))?;
            Ok(Datum::Branch(index, Box::new(read_value(branch, cursor)?)))
        }
    }
}

fn kind_label(kind: &SchemaKind) -> &'static str {
    match kind {
        SchemaKind::Boolean => "boolean",
        SchemaKind::Long => "long",
        SchemaKind::String => "string",
        SchemaKind::Bytes => "bytes",
        SchemaKind::Fixed { .. } => "fixed",
        SchemaKind::Enum { .. } => "enum",
        SchemaKind::Array(_) => "array",
        SchemaKind::Map(_) => "map",
        SchemaKind::Optional(_) => "optional",
        SchemaKind::Union(_) => "union",
    }
}

// ============================================================================
// WIRE PRIMITIVES
// ============================================================================

fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

fn write_uvarint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn error(&self, reason: impl Into<String>) -> EnvelopeError {
        EnvelopeError::Decode {
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], EnvelopeError> {
        if len > self.remaining() {
            return Err(self.error("unexpected end of payload"));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_byte(&mut self) -> Result<u8, EnvelopeError> {
        Ok(self.take(1)?[0])
    }

    fn read_uvarint(&mut self) -> Result<u64, EnvelopeError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            if shift >= 64 {
                return Err(self.error("varint overflow"));
            }
            let byte = self.read_byte()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read a count or length prefix, bounded by the remaining payload so a
    /// corrupt prefix cannot drive an oversized allocation.
    fn read_len(&mut self) -> Result<usize, EnvelopeError> {
        let len = self.read_uvarint()?;
        if len > self.remaining() as u64 {
            return Err(self.error("length prefix exceeds remaining payload"));
        }
        Ok(len as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Envelope;
    use crate::schema::FieldSchema;
    use crate::types::{BannerConfig, CostsConfig};
    use crate::user::{BlockingBehavior, ColorSlot, ColorValue, UserConfig};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn fingerprint() -> Fingerprint {
        Fingerprint::from([7u8; 8])
    }

    #[test]
    fn test_banner_round_trip() {
        let value = BannerConfig {
            banner: Some("maintenance at noon".to_string()),
        };
        let bytes = encode_config(fingerprint(), &value).unwrap();
        let envelope = Envelope::parse(&bytes).unwrap();
        assert_eq!(envelope.fingerprint, fingerprint());

        let decoded: BannerConfig =
            decode_config(&BannerConfig::schema(), envelope.payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_costs_round_trip_extremes() {
        for costs in [0, 1, -1, i64::MIN, i64::MAX] {
            let value = CostsConfig { costs };
            let bytes = encode_config(fingerprint(), &value).unwrap();
            let envelope = Envelope::parse(&bytes).unwrap();
            let decoded: CostsConfig =
                decode_config(&CostsConfig::schema(), envelope.payload).unwrap();
            assert_eq!(decoded.costs, costs);
        }
    }

    /// The user-config schema before wallpaper and colors existed.
    fn legacy_user_schema() -> ConfigSchema {
        ConfigSchema::new(
            "UserConfig",
            vec![
                FieldSchema::new(
                    "blocking_behavior",
                    SchemaKind::Optional(Box::new(SchemaKind::Enum {
                        symbols: vec!["hide".to_string(), "omit".to_string()],
                    })),
                ),
                FieldSchema::new(
                    "blocked_tags",
                    SchemaKind::Optional(Box::new(SchemaKind::Array(Box::new(
                        SchemaKind::Array(Box::new(SchemaKind::String)),
                    )))),
                ),
                FieldSchema::new(
                    "blocked_users",
                    SchemaKind::Optional(Box::new(SchemaKind::Array(Box::new(SchemaKind::Long)))),
                ),
            ],
        )
    }

    #[test]
    fn test_old_writer_decodes_with_reader_defaults() {
        let writer = legacy_user_schema();
        let datum = Datum::Record(vec![
            (
                "blocking_behavior".to_string(),
                Datum::optional(Some(Datum::Symbol("hide".to_string()))),
            ),
            (
                "blocked_tags".to_string(),
                Datum::optional(Some(Datum::Array(vec![Datum::Array(vec![
                    Datum::Str("gore".to_string()),
                    Datum::Str("nsfw".to_string()),
                ])]))),
            ),
            ("blocked_users".to_string(), Datum::optional(None)),
        ]);
        let payload = encode_datum(&writer, &datum).unwrap();

        let decoded: UserConfig = decode_config(&writer, &payload).unwrap();
        assert_eq!(decoded.blocking_behavior, Some(BlockingBehavior::Hide));
        assert_eq!(
            decoded.blocked_tags,
            Some(vec![vec!["gore".to_string(), "nsfw".to_string()]])
        );
        assert_eq!(decoded.blocked_users, None);
        // Fields the old writer never knew take the reader's defaults.
        assert_eq!(decoded.wallpaper, None);
        assert_eq!(decoded.colors, None);
    }

    #[test]
    fn test_writer_only_fields_are_dropped() {
        let writer = ConfigSchema::new(
            "BannerConfig",
            vec![
                FieldSchema::new("banner", SchemaKind::Optional(Box::new(SchemaKind::String))),
                FieldSchema::new(
                    "retired_flag",
                    SchemaKind::Optional(Box::new(SchemaKind::Boolean)),
                ),
            ],
        );
        let datum = Datum::Record(vec![
            (
                "banner".to_string(),
                Datum::optional(Some(Datum::Str("hello".to_string()))),
            ),
            (
                "retired_flag".to_string(),
                Datum::optional(Some(Datum::Boolean(true))),
            ),
        ]);
        let payload = encode_datum(&writer, &datum).unwrap();

        let decoded: BannerConfig = decode_config(&writer, &payload).unwrap();
        assert_eq!(decoded.banner.as_deref(), Some("hello"));
    }

    #[test]
    fn test_colors_union_round_trip() {
        let mut colors = BTreeMap::new();
        colors.insert(ColorSlot::Textcolor, ColorValue::Rgba(0x1f1f1fff));
        colors.insert(ColorSlot::Borderhover, ColorValue::Slot(ColorSlot::Main));
        let value = UserConfig {
            colors: Some(colors),
            ..UserConfig::default()
        };

        let payload = encode_datum(&UserConfig::schema(), &value.to_datum()).unwrap();
        let decoded: UserConfig = decode_config(&UserConfig::schema(), &payload).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let value = CostsConfig { costs: 12 };
        let mut payload = encode_datum(&CostsConfig::schema(), &value.to_datum()).unwrap();
        payload.push(0);
        let err = decode_datum(&CostsConfig::schema(), &payload).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode { .. }));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let value = BannerConfig {
            banner: Some("truncate me".to_string()),
        };
        let payload = encode_datum(&BannerConfig::schema(), &value.to_datum()).unwrap();
        let err = decode_datum(&BannerConfig::schema(), &payload[..payload.len() - 3]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode { .. }));
    }

    #[test]
    fn test_enum_index_out_of_range_rejected() {
        let writer = ConfigSchema::new(
            "Sample",
            vec![FieldSchema::new(
                "symbol",
                SchemaKind::Enum {
                    symbols: vec!["only".to_string()],
                },
            )],
        );
        // Symbol index 9 against a one-symbol enum.
        let err = decode_datum(&writer, &[9]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode { .. }));
    }

    #[test]
    fn test_oversized_length_prefix_rejected() {
        let writer = ConfigSchema::new(
            "Sample",
            vec![FieldSchema::new("value", SchemaKind::Bytes)],
        );
        // Length prefix claims far more bytes than the payload holds.
        let err = decode_datum(&writer, &[0xff, 0xff, 0x03, 1, 2]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decode { .. }));
    }

    fn arb_color_value() -> impl Strategy<Value = ColorValue> {
        prop_oneof![
            any::<u32>().prop_map(ColorValue::Rgba),
            proptest::sample::select(ColorSlot::ALL).prop_map(ColorValue::Slot),
        ]
    }

    fn arb_user_config() -> impl Strategy<Value = UserConfig> {
        (
            proptest::option::of(proptest::sample::select(BlockingBehavior::ALL)),
            proptest::option::of(proptest::collection::vec(
                proptest::collection::vec("[a-z]{1,8}", 0..4),
                0..4,
            )),
            proptest::option::of(proptest::collection::vec(any::<i64>(), 0..4)),
            proptest::option::of(any::<[u8; 8]>()),
            proptest::option::of(proptest::collection::btree_map(
                proptest::sample::select(ColorSlot::ALL),
                arb_color_value(),
                0..6,
            )),
        )
            .prop_map(
                |(blocking_behavior, blocked_tags, blocked_users, wallpaper, colors)| UserConfig {
                    blocking_behavior,
                    blocked_tags,
                    blocked_users,
                    wallpaper,
                    colors,
                },
            )
    }

    proptest! {
        #[test]
        fn user_config_round_trips(value in arb_user_config()) {
            let payload = encode_datum(&UserConfig::schema(), &value.to_datum()).unwrap();
            let decoded: UserConfig = decode_config(&UserConfig::schema(), &payload).unwrap();
            prop_assert_eq!(decoded, value);
        }
    }
}
