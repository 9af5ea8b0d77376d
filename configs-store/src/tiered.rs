//! Two-tier read-through/write-through cache.
//!
//! Reads check the local tier, then the distributed tier (backfilling local
//! on a hit). Writes go through both tiers: the local write is synchronous
//! and cannot fail, the distributed write is best-effort: the repository
//! stays authoritative and this process already holds the fresh value, so a
//! shared-cache failure is logged and swallowed.

use std::sync::Arc;
use std::time::Duration;

use crate::local::LocalTier;
use crate::remote::DistributedCache;
use crate::types::CachedConfig;

pub struct TieredCache {
    local: LocalTier,
    remote: Arc<dyn DistributedCache>,
}

impl TieredCache {
    pub fn new(local_ttl: Duration, remote: Arc<dyn DistributedCache>) -> Self {
        Self {
            local: LocalTier::new(local_ttl),
            remote,
        }
    }

    /// Look a key up in both tiers. A distributed-tier failure or an
    /// undecodable shared entry degrades to a miss.
    pub async fn get(&self, key: &str) -> Option<CachedConfig> {
        if let Some(value) = self.local.get(key) {
            return Some(value);
        }

        match self.remote.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<CachedConfig>(&bytes) {
                Ok(value) => {
                    self.local.put(key.to_string(), value.clone());
                    Some(value)
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "discarding undecodable distributed cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "distributed cache read failed");
                None
            }
        }
    }

    /// Write through both tiers, overwriting any previous value for the key.
    pub async fn put(&self, key: &str, value: CachedConfig) {
        self.local.put(key.to_string(), value.clone());

        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(err) = self.remote.put(key, bytes).await {
                    tracing::warn!(key, error = %err, "distributed cache write failed");
                }
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to serialize value for distributed cache");
            }
        }
    }
}
