//! fuzzly-configs store: two-tier cached, schema-versioned config storage.
//!
//! Reads go local tier → distributed tier → repository (decoding the stored
//! envelope against the writer's registered schema); writes encode, upsert,
//! then write through both cache tiers. See [`store::ConfigStore`].

pub mod config;
pub mod local;
pub mod remote;
pub mod repository;
pub mod store;
pub mod tiered;
pub mod types;

pub use config::StoreConfig;
pub use local::LocalTier;
pub use remote::{CacheNamespace, DistributedCache, InMemoryDistributedCache, RemoteCacheError};
pub use repository::{ConfigPersistence, DbConfig, PgConfigRepository};
pub use store::{user_config_key, ConfigStore, PgConfigStore, USER_CONFIG_KEY_PREFIX};
pub use tiered::TieredCache;
pub use types::CachedConfig;
