//! Store configuration, loaded from environment variables with development
//! defaults.

use std::time::Duration;

use configs_registry::{RegistryConfig, DEFAULT_SCHEMA_CACHE_CAPACITY};

use crate::repository::DbConfig;

/// Top-level configuration for a [`crate::store::ConfigStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db: DbConfig,
    pub registry: RegistryConfig,
    /// Local cache tier TTL. Short by design: it bounds how stale this
    /// process can be with respect to other processes' writes.
    pub local_ttl: Duration,
    /// Capacity of the fingerprint-to-schema cache.
    pub schema_cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            registry: RegistryConfig::default(),
            local_ttl: Duration::from_secs(60),
            schema_cache_capacity: DEFAULT_SCHEMA_CACHE_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Create a store configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CONFIGS_LOCAL_TTL_SECS`: local tier TTL (default: 60)
    /// - `CONFIGS_SCHEMA_CACHE_CAPACITY`: schema cache size (default: 32)
    /// - plus [`DbConfig::from_env`] and [`RegistryConfig::from_env`]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db: DbConfig::from_env(),
            registry: RegistryConfig::from_env(),
            local_ttl: std::env::var("CONFIGS_LOCAL_TTL_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.local_ttl),
            schema_cache_capacity: std::env::var("CONFIGS_SCHEMA_CACHE_CAPACITY")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(defaults.schema_cache_capacity),
        }
    }
}
