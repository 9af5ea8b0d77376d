//! fuzzly-configs core: envelope codec, schema model, and shared types.
//!
//! Everything in this crate is pure: no I/O, no clocks. The store and
//! registry crates compose these pieces around PostgreSQL, the schema
//! registry service, and the cache tiers.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod schema;
pub mod types;
pub mod user;

pub use codec::{decode_config, decode_datum, encode_config, encode_datum};
pub use envelope::{seal, Envelope, Fingerprint, ENVELOPE_HEADER_LEN, ENVELOPE_MARKER};
pub use error::{
    ConfigError, ConfigResult, EnvelopeError, RegistryError, StorageError, ValidationError,
};
pub use schema::{ConfigSchema, Datum, FieldSchema, RecordReader, SchemaKind};
pub use types::{
    BannerConfig, ConfigKind, ConfigRecord, ConfigValue, CostsConfig, GlobalConfig, Timestamp,
    UserId,
};
pub use user::{BlockingBehavior, ColorSlot, ColorValue, UserConfig, UserConfigUpdate};
