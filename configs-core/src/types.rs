//! Config record types and the kind-to-shape mapping.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::EnvelopeError;
use crate::schema::{ConfigSchema, Datum, FieldSchema, RecordReader, SchemaKind};

/// User identifier, matching the BIGINT `updated_by` audit column.
pub type UserId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// One persisted row of the `configs` table.
///
/// `bytes` is a complete envelope (an empty value is treated as no record).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRecord {
    pub key: String,
    pub bytes: Vec<u8>,
    pub updated_by: UserId,
    pub updated_on: Timestamp,
}

/// Closed set of site-global config slots.
///
/// Each variant is one row of the table; the variant name doubles as the
/// storage and cache key. Adding a variant without extending
/// [`GlobalConfig`] and the registration set is a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Banner,
    Costs,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 2] = [ConfigKind::Banner, ConfigKind::Costs];

    /// Storage key for this config slot.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::Banner => "banner",
            ConfigKind::Costs => "costs",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ConfigKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| format!("unknown config kind: {value}"))
    }
}

/// Site banner text shown above every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BannerConfig {
    pub banner: Option<String>,
}

/// Monthly operating costs, displayed on the funding progress bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CostsConfig {
    pub costs: i64,
}

/// A decoded site-global config, tagged by its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GlobalConfig {
    Banner(BannerConfig),
    Costs(CostsConfig),
}

impl GlobalConfig {
    pub fn kind(&self) -> ConfigKind {
        match self {
            GlobalConfig::Banner(_) => ConfigKind::Banner,
            GlobalConfig::Costs(_) => ConfigKind::Costs,
        }
    }
}

/// A config shape that can cross the envelope codec.
///
/// `schema()` must describe exactly what `to_datum` produces, and
/// `from_datum` must accept records from any older registered schema of the
/// same name, defaulting the fields that writer lacked.
pub trait ConfigValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The current (reader) schema for this shape.
    fn schema() -> ConfigSchema;

    /// Project the value into the generic datum tree.
    fn to_datum(&self) -> Datum;

    /// Map a decoded datum tree back into the concrete shape.
    fn from_datum(datum: Datum) -> Result<Self, EnvelopeError>;
}

impl ConfigValue for BannerConfig {
    fn schema() -> ConfigSchema {
        ConfigSchema::new(
            "BannerConfig",
            vec![FieldSchema::new(
                "banner",
                SchemaKind::Optional(Box::new(SchemaKind::String)),
            )],
        )
    }

    fn to_datum(&self) -> Datum {
        Datum::Record(vec![(
            "banner".to_string(),
            Datum::optional(self.banner.as_ref().map(|text| Datum::Str(text.clone()))),
        )])
    }

    fn from_datum(datum: Datum) -> Result<Self, EnvelopeError> {
        let mut record = RecordReader::new(datum)?;
        let banner = match record.take_optional("banner")? {
            Some(value) => Some(value.into_str()?),
            None => None,
        };
        Ok(Self { banner })
    }
}

impl ConfigValue for CostsConfig {
    fn schema() -> ConfigSchema {
        ConfigSchema::new(
            "CostsConfig",
            vec![FieldSchema::new("costs", SchemaKind::Long)],
        )
    }

    fn to_datum(&self) -> Datum {
        Datum::Record(vec![("costs".to_string(), Datum::Long(self.costs))])
    }

    fn from_datum(datum: Datum) -> Result<Self, EnvelopeError> {
        let mut record = RecordReader::new(datum)?;
        let costs = match record.take("costs") {
            Some(value) => value.into_long()?,
            None => 0,
        };
        Ok(Self { costs })
    }
}
