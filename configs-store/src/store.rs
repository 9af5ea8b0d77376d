//! The config store orchestrator.
//!
//! Composes the tiered cache, the repository, the schema cache, and the
//! startup registrations into the four public operations. The one ordering
//! rule that matters everywhere: the durable write happens before the cache
//! write, so a value observed in any cache tier was committed at some point.

use std::sync::Arc;

use configs_core::{
    decode_config, encode_config, ConfigKind, ConfigRecord, ConfigResult, Envelope, GlobalConfig,
    StorageError, UserConfig, UserConfigUpdate, UserId,
};
use configs_registry::{
    SchemaCache, SchemaLookup, SchemaRegistrations, SchemaRegistryClient,
};

use crate::config::StoreConfig;
use crate::remote::DistributedCache;
use crate::repository::{ConfigPersistence, PgConfigRepository};
use crate::tiered::TieredCache;
use crate::types::CachedConfig;

/// Key namespace for per-user rows in the shared table.
pub const USER_CONFIG_KEY_PREFIX: &str = "user.";

/// Storage and cache key for one user's config.
pub fn user_config_key(user_id: UserId) -> String {
    format!("{USER_CONFIG_KEY_PREFIX}{user_id}")
}

/// Cached, schema-versioned config storage.
///
/// Generic over the persistence seam and the schema lookup so tests can
/// fault-inject both; production wiring is [`PgConfigStore`].
pub struct ConfigStore<P, L> {
    persistence: P,
    cache: TieredCache,
    schemas: SchemaCache<L>,
    registrations: SchemaRegistrations,
}

/// Production store: PostgreSQL repository, registry-backed schema cache.
pub type PgConfigStore = ConfigStore<PgConfigRepository, SchemaRegistryClient>;

impl ConfigStore<PgConfigRepository, SchemaRegistryClient> {
    /// Wire up a production store.
    ///
    /// Registers every config schema with the registry first and fails fast
    /// if any registration fails, since serving traffic with an unregistered
    /// fingerprint would strand every row written.
    pub async fn bootstrap(
        config: StoreConfig,
        remote: Arc<dyn DistributedCache>,
    ) -> ConfigResult<Self> {
        let client = SchemaRegistryClient::new(config.registry.clone());
        let registrations = SchemaRegistrations::register_all(&client).await?;
        let persistence = PgConfigRepository::from_config(&config.db)?;
        let cache = TieredCache::new(config.local_ttl, remote);
        let schemas = SchemaCache::new(client, config.schema_cache_capacity);
        Ok(ConfigStore::new(persistence, cache, schemas, registrations))
    }
}

impl<P: ConfigPersistence, L: SchemaLookup> ConfigStore<P, L> {
    pub fn new(
        persistence: P,
        cache: TieredCache,
        schemas: SchemaCache<L>,
        registrations: SchemaRegistrations,
    ) -> Self {
        Self {
            persistence,
            cache,
            schemas,
            registrations,
        }
    }

    /// Read a site-global config.
    ///
    /// Cache tiers first; on a full miss the repository is authoritative and
    /// a missing row is an error; global slots are expected to exist once
    /// a moderator has set them.
    pub async fn get_config(&self, kind: ConfigKind) -> ConfigResult<GlobalConfig> {
        let key = kind.as_str();
        if let Some(cached) = self.cache.get(key).await {
            if let Some(value) = cached.into_global(kind) {
                return Ok(value);
            }
        }

        let record = self
            .fetch_present(key)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        let value = self.decode_global(kind, &record.bytes).await?;
        self.cache.put(key, CachedConfig::from(value.clone())).await;
        Ok(value)
    }

    /// Replace a site-global config.
    pub async fn update_config(&self, value: GlobalConfig, actor: UserId) -> ConfigResult<()> {
        let kind = value.kind();
        let fingerprint = self.registrations.fingerprint_for(kind);
        let bytes = match &value {
            GlobalConfig::Banner(banner) => encode_config(fingerprint, banner)?,
            GlobalConfig::Costs(costs) => encode_config(fingerprint, costs)?,
        };

        self.persistence.upsert(kind.as_str(), &bytes, actor).await?;
        // Cache strictly after the durable write: a failed upsert must never
        // leave an unpersisted value in either tier.
        self.cache
            .put(kind.as_str(), CachedConfig::from(value))
            .await;
        tracing::debug!(kind = %kind, actor, "updated config");
        Ok(())
    }

    /// Read one user's config.
    ///
    /// A user with no stored row gets the zero-value config; never an error.
    pub async fn get_user_config(&self, user_id: UserId) -> ConfigResult<UserConfig> {
        let key = user_config_key(user_id);
        if let Some(cached) = self.cache.get(&key).await {
            if let Some(value) = cached.into_user() {
                return Ok(value);
            }
        }

        let value = match self.fetch_present(&key).await? {
            Some(record) => {
                let envelope = Envelope::parse(&record.bytes)?;
                let writer = self.schemas.resolve(envelope.fingerprint).await?;
                decode_config::<UserConfig>(&writer, envelope.payload)?
            }
            None => UserConfig::default(),
        };
        self.cache.put(&key, CachedConfig::User(value.clone())).await;
        Ok(value)
    }

    /// Normalize and store one user's config, returning the stored shape.
    pub async fn set_user_config(
        &self,
        actor: UserId,
        update: UserConfigUpdate,
    ) -> ConfigResult<UserConfig> {
        let value = update.into_stored()?;
        let bytes = encode_config(self.registrations.user_fingerprint(), &value)?;
        let key = user_config_key(actor);

        self.persistence.upsert(&key, &bytes, actor).await?;
        self.cache.put(&key, CachedConfig::User(value.clone())).await;
        tracing::debug!(actor, "updated user config");
        Ok(value)
    }

    /// Fetch a row, treating an empty stored value as no record.
    async fn fetch_present(&self, key: &str) -> ConfigResult<Option<ConfigRecord>> {
        Ok(self
            .persistence
            .fetch(key)
            .await?
            .filter(|record| !record.bytes.is_empty()))
    }

    async fn decode_global(&self, kind: ConfigKind, bytes: &[u8]) -> ConfigResult<GlobalConfig> {
        let envelope = Envelope::parse(bytes)?;
        let writer = self.schemas.resolve(envelope.fingerprint).await?;
        Ok(match kind {
            ConfigKind::Banner => GlobalConfig::Banner(decode_config(&writer, envelope.payload)?),
            ConfigKind::Costs => GlobalConfig::Costs(decode_config(&writer, envelope.payload)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{CacheNamespace, InMemoryDistributedCache};
    use async_trait::async_trait;
    use chrono::Utc;
    use configs_core::{
        encode_datum, seal, BannerConfig, BlockingBehavior, ConfigError, ConfigSchema, ConfigValue,
        CostsConfig, Datum, EnvelopeError, FieldSchema, Fingerprint, SchemaKind,
        ENVELOPE_MARKER,
    };
    use configs_registry::{SchemaRegistrar, DEFAULT_SCHEMA_CACHE_CAPACITY};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Shared in-memory persistence with read/write fault injection.
    #[derive(Clone, Default)]
    struct MemoryPersistence {
        rows: Arc<Mutex<HashMap<String, ConfigRecord>>>,
        fail_reads: Arc<AtomicBool>,
        fail_writes: Arc<AtomicBool>,
    }

    impl MemoryPersistence {
        fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
            self.rows.lock().unwrap().insert(
                key.to_string(),
                ConfigRecord {
                    key: key.to_string(),
                    bytes,
                    updated_by: 0,
                    updated_on: Utc::now(),
                },
            );
        }

        fn raw_bytes(&self, key: &str) -> Option<Vec<u8>> {
            self.rows
                .lock()
                .unwrap()
                .get(key)
                .map(|record| record.bytes.clone())
        }
    }

    #[async_trait]
    impl ConfigPersistence for MemoryPersistence {
        async fn fetch(&self, key: &str) -> ConfigResult<Option<ConfigRecord>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Database {
                    reason: "injected read failure".to_string(),
                }
                .into());
            }
            Ok(self.rows.lock().unwrap().get(key).cloned())
        }

        async fn upsert(&self, key: &str, bytes: &[u8], updated_by: UserId) -> ConfigResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Database {
                    reason: "injected write failure".to_string(),
                }
                .into());
            }
            self.rows.lock().unwrap().insert(
                key.to_string(),
                ConfigRecord {
                    key: key.to_string(),
                    bytes: bytes.to_vec(),
                    updated_by,
                    updated_on: Utc::now(),
                },
            );
            Ok(())
        }
    }

    /// In-memory registry handing out sequential fingerprints.
    #[derive(Clone, Default)]
    struct StubRegistry {
        schemas: Arc<Mutex<HashMap<Fingerprint, ConfigSchema>>>,
        next: Arc<AtomicU8>,
    }

    impl StubRegistry {
        fn insert_schema(&self, fingerprint: Fingerprint, schema: ConfigSchema) {
            self.schemas.lock().unwrap().insert(fingerprint, schema);
        }
    }

    #[async_trait]
    impl SchemaRegistrar for StubRegistry {
        async fn register(&self, schema: &ConfigSchema) -> ConfigResult<Fingerprint> {
            let tag = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            let fingerprint = Fingerprint::from([tag; 8]);
            self.insert_schema(fingerprint, schema.clone());
            Ok(fingerprint)
        }
    }

    #[async_trait]
    impl SchemaLookup for StubRegistry {
        async fn lookup(&self, fingerprint: Fingerprint) -> ConfigResult<ConfigSchema> {
            self.schemas
                .lock()
                .unwrap()
                .get(&fingerprint)
                .cloned()
                .ok_or_else(|| {
                    configs_core::RegistryError::SchemaNotFound {
                        fingerprint: fingerprint.to_base64(),
                    }
                    .into()
                })
        }
    }

    type TestStore = ConfigStore<MemoryPersistence, StubRegistry>;

    async fn store_with(
        persistence: MemoryPersistence,
        registry: StubRegistry,
        remote: Arc<dyn DistributedCache>,
    ) -> TestStore {
        let registrations = SchemaRegistrations::register_all(&registry).await.unwrap();
        let cache = TieredCache::new(Duration::from_secs(60), remote);
        let schemas = SchemaCache::new(registry, DEFAULT_SCHEMA_CACHE_CAPACITY);
        ConfigStore::new(persistence, cache, schemas, registrations)
    }

    async fn test_store() -> (TestStore, MemoryPersistence, StubRegistry) {
        let persistence = MemoryPersistence::default();
        let registry = StubRegistry::default();
        let remote = Arc::new(InMemoryDistributedCache::new(CacheNamespace::default()));
        let store = store_with(persistence.clone(), registry.clone(), remote).await;
        (store, persistence, registry)
    }

    #[tokio::test]
    async fn test_get_config_not_found() {
        let (store, _, _) = test_store().await;
        let err = store.get_config(ConfigKind::Banner).await.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Storage(StorageError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_then_get_round_trip() {
        let (store, persistence, _) = test_store().await;
        let value = GlobalConfig::Banner(BannerConfig {
            banner: Some("scheduled maintenance".to_string()),
        });

        store.update_config(value.clone(), 1).await.unwrap();
        assert_eq!(store.get_config(ConfigKind::Banner).await.unwrap(), value);

        // The persisted row is a complete envelope.
        let bytes = persistence.raw_bytes("banner").unwrap();
        assert_eq!(&bytes[..2], &ENVELOPE_MARKER);
    }

    #[tokio::test]
    async fn test_update_serves_reads_without_repository() {
        let (store, persistence, _) = test_store().await;
        let value = GlobalConfig::Costs(CostsConfig { costs: 600 });

        store.update_config(value.clone(), 1).await.unwrap();
        persistence.fail_reads(true);

        // Same-process read-after-write never touches the repository.
        assert_eq!(store.get_config(ConfigKind::Costs).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_failed_upsert_leaves_cache_unchanged() {
        let (store, persistence, _) = test_store().await;
        let first = GlobalConfig::Costs(CostsConfig { costs: 100 });
        store.update_config(first.clone(), 1).await.unwrap();

        persistence.fail_writes(true);
        let second = GlobalConfig::Costs(CostsConfig { costs: 999 });
        let err = store.update_config(second, 1).await.unwrap_err();
        assert!(matches!(err, ConfigError::Storage(_)));

        // The cache still serves the last durable value.
        persistence.fail_reads(true);
        assert_eq!(store.get_config(ConfigKind::Costs).await.unwrap(), first);
    }

    #[tokio::test]
    async fn test_user_config_defaults_on_absence() {
        let (store, persistence, _) = test_store().await;
        assert_eq!(
            store.get_user_config(42).await.unwrap(),
            UserConfig::default()
        );

        // The default is cached like any other read.
        persistence.fail_reads(true);
        assert_eq!(
            store.get_user_config(42).await.unwrap(),
            UserConfig::default()
        );
    }

    #[tokio::test]
    async fn test_set_then_get_user_config() {
        let (store, _, _) = test_store().await;
        let update = UserConfigUpdate {
            blocking_behavior: Some(BlockingBehavior::Hide),
            ..UserConfigUpdate::default()
        };

        let stored = store.set_user_config(42, update).await.unwrap();
        let read = store.get_user_config(42).await.unwrap();
        assert_eq!(read, stored);
        assert_eq!(read.blocking_behavior, Some(BlockingBehavior::Hide));
        assert_eq!(read.blocked_users, None);
        assert_eq!(read.wallpaper, None);
    }

    #[tokio::test]
    async fn test_invalid_user_update_rejected_before_write() {
        let (store, persistence, _) = test_store().await;
        let update = UserConfigUpdate {
            wallpaper: Some("not a post ref".to_string()),
            ..UserConfigUpdate::default()
        };

        let err = store.set_user_config(7, update).await.unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(persistence.raw_bytes(&user_config_key(7)).is_none());
    }

    #[tokio::test]
    async fn test_decodes_row_written_under_old_schema() {
        let (store, persistence, registry) = test_store().await;

        // A row written before wallpaper and colors existed, under a
        // fingerprint only the registry remembers.
        let legacy_fingerprint = Fingerprint::from([0xee; 8]);
        let legacy_schema = ConfigSchema::new(
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
            ],
        );
        let datum = Datum::Record(vec![
            (
                "blocking_behavior".to_string(),
                Datum::optional(Some(Datum::Symbol("omit".to_string()))),
            ),
            ("blocked_tags".to_string(), Datum::optional(None)),
        ]);
        let payload = encode_datum(&legacy_schema, &datum).unwrap();
        registry.insert_schema(legacy_fingerprint, legacy_schema);
        persistence.insert_raw(&user_config_key(7), seal(legacy_fingerprint, &payload));

        let value = store.get_user_config(7).await.unwrap();
        assert_eq!(value.blocking_behavior, Some(BlockingBehavior::Omit));
        assert_eq!(value.blocked_tags, None);
        assert_eq!(value.wallpaper, None);
        assert_eq!(value.colors, None);
    }

    #[tokio::test]
    async fn test_empty_row_treated_as_missing() {
        let (store, persistence, _) = test_store().await;
        persistence.insert_raw("banner", Vec::new());
        persistence.insert_raw(&user_config_key(3), Vec::new());

        assert!(matches!(
            store.get_config(ConfigKind::Banner).await.unwrap_err(),
            ConfigError::Storage(StorageError::NotFound { .. })
        ));
        assert_eq!(
            store.get_user_config(3).await.unwrap(),
            UserConfig::default()
        );
    }

    #[tokio::test]
    async fn test_corrupt_row_fails_only_that_operation() {
        let (store, persistence, _) = test_store().await;
        persistence.insert_raw("banner", b"XY-not-an-envelope".to_vec());

        let err = store.get_config(ConfigKind::Banner).await.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Envelope(EnvelopeError::MarkerMismatch { .. })
        ));

        // Other slots are unaffected.
        store
            .update_config(GlobalConfig::Costs(CostsConfig { costs: 5 }), 1)
            .await
            .unwrap();
        assert!(store.get_config(ConfigKind::Costs).await.is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_fingerprint_fails_decode() {
        let (store, persistence, _) = test_store().await;
        persistence.insert_raw("costs", seal(Fingerprint::from([0x99; 8]), &[0]));

        let err = store.get_config(ConfigKind::Costs).await.unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registry(configs_core::RegistryError::SchemaNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_second_process_reads_through_distributed_tier() {
        let persistence = MemoryPersistence::default();
        let registry = StubRegistry::default();
        let remote = Arc::new(InMemoryDistributedCache::new(CacheNamespace::default()));

        let writer = store_with(persistence.clone(), registry.clone(), remote.clone()).await;
        let reader = store_with(persistence.clone(), registry, remote).await;

        let value = GlobalConfig::Banner(BannerConfig {
            banner: Some("shared".to_string()),
        });
        writer.update_config(value.clone(), 1).await.unwrap();

        // The second process finds the value in the shared tier without a
        // repository round-trip.
        persistence.fail_reads(true);
        assert_eq!(reader.get_config(ConfigKind::Banner).await.unwrap(), value);
    }

    #[tokio::test]
    async fn test_concurrent_updates_settle_on_one_value() {
        let (store, persistence, _) = test_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for costs in 0..8i64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .update_config(GlobalConfig::Costs(CostsConfig { costs }), costs)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let written: HashSet<i64> = (0..8).collect();

        // The repository holds exactly one of the written values.
        let bytes = persistence.raw_bytes("costs").unwrap();
        let envelope = Envelope::parse(&bytes).unwrap();
        let persisted: CostsConfig =
            decode_config(&CostsConfig::schema(), envelope.payload).unwrap();
        assert!(written.contains(&persisted.costs));

        // So do the cache tiers.
        match store.get_config(ConfigKind::Costs).await.unwrap() {
            GlobalConfig::Costs(cached) => assert!(written.contains(&cached.costs)),
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
