//! Schema registry integration: HTTP client, fingerprint cache, and the
//! startup registration set.

pub mod client;
pub mod registrations;
pub mod schema_cache;

pub use client::{RegistryConfig, SchemaLookup, SchemaRegistrar, SchemaRegistryClient};
pub use registrations::SchemaRegistrations;
pub use schema_cache::{SchemaCache, DEFAULT_SCHEMA_CACHE_CAPACITY};
