//! Distributed cache tier boundary.
//!
//! The shared cache is an external, already-concurrent-safe service with its
//! own TTL policy; this module only defines the seam the store talks
//! through, plus an in-memory implementation for tests and single-process
//! deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteCacheError {
    #[error("distributed cache backend error: {reason}")]
    Backend { reason: String },
}

/// Application/store pair namespacing this store's keys within the shared
/// cache service.
#[derive(Debug, Clone)]
pub struct CacheNamespace {
    pub app: String,
    pub store: String,
}

impl CacheNamespace {
    pub fn new(app: impl Into<String>, store: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            store: store.into(),
        }
    }

    fn qualify(&self, key: &str) -> String {
        format!("{}.{}.{}", self.app, self.store, key)
    }
}

impl Default for CacheNamespace {
    fn default() -> Self {
        Self::new("fuzzly", "configs")
    }
}

/// Get/put by string key against the shared cache service.
///
/// Values are opaque bytes; the tiered cache serializes on the way in and
/// out. Expiry is service-managed and not part of this contract.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteCacheError>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RemoteCacheError>;
}

/// In-memory stand-in for the shared cache service.
///
/// Entries never expire; real deployments rely on the external service's
/// own expiry policy.
#[derive(Default)]
pub struct InMemoryDistributedCache {
    namespace: CacheNamespace,
    entries: DashMap<String, Vec<u8>>,
}

impl InMemoryDistributedCache {
    pub fn new(namespace: CacheNamespace) -> Self {
        Self {
            namespace,
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl DistributedCache for InMemoryDistributedCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteCacheError> {
        Ok(self
            .entries
            .get(&self.namespace.qualify(key))
            .map(|entry| entry.clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RemoteCacheError> {
        self.entries.insert(self.namespace.qualify(key), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let cache = InMemoryDistributedCache::default();
        assert_eq!(cache.get("banner").await.unwrap(), None);
        cache.put("banner", b"value".to_vec()).await.unwrap();
        assert_eq!(cache.get("banner").await.unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn test_namespace_qualifies_keys() {
        let namespace = CacheNamespace::new("fuzzly", "configs");
        assert_eq!(namespace.qualify("user.42"), "fuzzly.configs.user.42");
    }
}
